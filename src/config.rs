use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub gear: GearConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub basket: BasketConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Directory the replay gateway reads candles and quotes from
    pub replay_dir: PathBuf,
    pub spot_exchange: String,
    /// NIFTY 50 index token
    pub spot_token: String,
    pub vix_exchange: String,
    /// INDIA VIX token
    pub vix_token: String,
    pub future_exchange: String,
    /// Search text used to resolve the near-month future
    pub future_search: String,
    /// Source candle interval in minutes
    pub candle_interval_mins: u32,
    /// How far back to request candles
    pub lookback_hours: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            replay_dir: PathBuf::from("data/replay"),
            spot_exchange: "NSE".to_string(),
            spot_token: "26000".to_string(),
            vix_exchange: "NSE".to_string(),
            vix_token: "26017".to_string(),
            future_exchange: "NFO".to_string(),
            future_search: "NIFTY".to_string(),
            candle_interval_mins: 1,
            lookback_hours: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub ema_period: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub supertrend_period: usize,
    pub supertrend_multiplier: f64,
    /// Entry requires RSI strictly below this ceiling
    pub entry_rsi_max: f64,
    /// Signal exit fires when bearish and RSI is above this level
    pub exit_rsi_mid: f64,
    /// Shift applied before hourly bucketing (0 = clock-hour aligned)
    pub session_offset_secs: i64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            ema_period: 20,
            rsi_period: 19,
            atr_period: 14,
            supertrend_period: 21,
            supertrend_multiplier: 1.1,
            entry_rsi_max: 65.0,
            exit_rsi_mid: 40.0,
            session_offset_secs: 0,
        }
    }
}

/// VIX band edges. `< high_below` is High, `< medium_below` is Medium,
/// `<= no_trade_upto` is NoTrade, anything above is Low.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GearConfig {
    pub high_below: f64,
    pub medium_below: f64,
    pub no_trade_upto: f64,
    /// Capital that sizes one lot per gear unit
    pub reference_capital: Decimal,
}

impl Default for GearConfig {
    fn default() -> Self {
        Self {
            high_below: 14.0,
            medium_below: 16.0,
            no_trade_upto: 18.0,
            reference_capital: dec!(625000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum tolerated |future - spot| in index points
    pub max_basis: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { max_basis: 50.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BasketConfig {
    pub strike_step: i64,
    /// Units per lot
    pub lot_size: u32,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            strike_step: 50,
            lot_size: 65,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Trading capital used for sizing and the MTM loss limit
    pub capital: Decimal,
    /// Options positions exit when the loss exceeds this share of capital
    pub max_loss_fraction: Decimal,
    /// Futures stop distance in multiples of ATR at entry
    pub atr_stop_multiplier: f64,
    /// Round-trip cost deducted per lot on exit (0 = off)
    pub friction_points_per_lot: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            capital: dec!(625000),
            max_loss_fraction: dec!(0.045),
            atr_stop_multiplier: 2.0,
            friction_points_per_lot: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cadence for detecting a newly closed hourly bar
    pub bar_poll_secs: u64,
    /// Cadence for risk checks while a position is open
    pub risk_poll_secs: u64,
    /// Cadence of the background quote refresher
    pub quote_refresh_secs: u64,
    /// Quotes older than this are treated as missing
    pub max_quote_age_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bar_poll_secs: 60,
            risk_poll_secs: 3,
            quote_refresh_secs: 2,
            max_quote_age_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Linear backoff: sleep `backoff_ms * attempt` between attempts
    pub backoff_ms: u64,
    /// Per-attempt timeout
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 2000,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the JSON snapshots and JSONL journals
    pub state_dir: PathBuf,
    /// Healthy ticks required before an open issue auto-closes
    pub issue_close_after_ok: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("state"),
            issue_close_after_ok: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the daily rolling log file
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: default_log_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("NIFTYGEAR_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (NIFTYGEAR_RISK__CAPITAL, etc.)
            .add_source(
                Environment::with_prefix("NIFTYGEAR")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let s = &self.strategy;
        for (name, period) in [
            ("ema_period", s.ema_period),
            ("rsi_period", s.rsi_period),
            ("atr_period", s.atr_period),
            ("supertrend_period", s.supertrend_period),
        ] {
            if period == 0 {
                errors.push(format!("strategy.{name} must be at least 1"));
            }
        }
        if !(s.supertrend_multiplier.is_finite() && s.supertrend_multiplier > 0.0) {
            errors.push("strategy.supertrend_multiplier must be positive".to_string());
        }
        if !(0.0..=100.0).contains(&s.entry_rsi_max) || !(0.0..=100.0).contains(&s.exit_rsi_mid) {
            errors.push("strategy RSI thresholds must be within [0, 100]".to_string());
        }

        let g = &self.gear;
        if !(g.high_below <= g.medium_below && g.medium_below <= g.no_trade_upto) {
            errors.push(format!(
                "gear bands must be ordered: high_below {} <= medium_below {} <= no_trade_upto {}",
                g.high_below, g.medium_below, g.no_trade_upto
            ));
        }
        if g.reference_capital <= Decimal::ZERO {
            errors.push("gear.reference_capital must be positive".to_string());
        }

        if !(self.gate.max_basis.is_finite() && self.gate.max_basis >= 0.0) {
            errors.push("gate.max_basis must be non-negative".to_string());
        }

        if self.basket.strike_step <= 0 {
            errors.push("basket.strike_step must be positive".to_string());
        }
        if self.basket.lot_size == 0 {
            errors.push("basket.lot_size must be positive".to_string());
        }

        let r = &self.risk;
        if r.capital < Decimal::ZERO {
            errors.push("risk.capital must not be negative".to_string());
        }
        if r.max_loss_fraction <= Decimal::ZERO || r.max_loss_fraction >= Decimal::ONE {
            errors.push("risk.max_loss_fraction must be between 0 and 1".to_string());
        }
        if !(r.atr_stop_multiplier.is_finite() && r.atr_stop_multiplier > 0.0) {
            errors.push("risk.atr_stop_multiplier must be positive".to_string());
        }
        if r.friction_points_per_lot < Decimal::ZERO {
            errors.push("risk.friction_points_per_lot must not be negative".to_string());
        }

        let e = &self.engine;
        if e.bar_poll_secs == 0 || e.risk_poll_secs == 0 || e.quote_refresh_secs == 0 {
            errors.push("engine poll intervals must be at least 1 second".to_string());
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.timeout_ms == 0 {
            errors.push("retry.timeout_ms must be positive".to_string());
        }

        if self.broker.candle_interval_mins == 0 || 60 % self.broker.candle_interval_mins != 0 {
            errors.push("broker.candle_interval_mins must divide 60".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.strategy.rsi_period, 19);
        assert_eq!(cfg.gear.reference_capital, dec!(625000));
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut cfg = AppConfig::default();
        cfg.gear.high_below = 20.0;
        cfg.basket.lot_size = 0;
        cfg.retry.max_attempts = 0;

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_load_from_reads_default_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[gate]\nmax_basis = 75.0\n\n[risk]\ncapital = \"1250000\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(cfg.gate.max_basis, 75.0);
        assert_eq!(cfg.risk.capital, dec!(1250000));
        // untouched sections keep their defaults
        assert_eq!(cfg.basket.lot_size, 65);
    }
}
