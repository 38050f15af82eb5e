use niftygear::config::LoggingConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "niftygear.log";

/// `NIFTYGEAR_LOG_DIR`, else the configured directory
fn log_dir(cfg: &LoggingConfig) -> PathBuf {
    std::env::var("NIFTYGEAR_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| cfg.dir.clone())
}

/// Create the directory and prove a file can be opened in it
fn check_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let marker = dir.join(".niftygear_write_check");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)?;
    std::fs::remove_file(&marker)
}

pub fn init_logging(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},niftygear=debug", cfg.level)));

    let dir = log_dir(cfg);
    let file_layer = match check_writable(&dir) {
        Ok(()) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE));
            // flushes on drop; held until exit
            Box::leak(Box::new(guard));
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        Err(e) => {
            eprintln!("file logging disabled, {} not writable: {e}", dir.display());
            None
        }
    };

    let json_console = cfg
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let plain_console = (!cfg.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
    });

    let to_file = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(plain_console)
        .with(json_console)
        .with(file_layer)
        .init();

    if to_file {
        eprintln!("logging to {}", dir.join(LOG_FILE).display());
    }
}

/// Warnings only, for `status` and `gear`
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_dir_is_created_and_left_clean() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("logs");

        check_writable(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_dir_under_a_file_is_not_writable() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("plain");
        std::fs::write(&file, "x").unwrap();

        assert!(check_writable(&file.join("logs")).is_err());
    }
}
