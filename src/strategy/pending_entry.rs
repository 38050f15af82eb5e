use crate::domain::{PendingEntry, SpotSignal};

/// Where the pending entry stands on a given bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    /// Nothing armed and nothing to arm
    Idle,
    /// Armed on this or an earlier bar, waiting for a later bar
    Armed,
    /// A later bar arrived; the armed signal may execute now
    Ready,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Idle => "IDLE",
            PendingStatus::Armed => "ARMED",
            PendingStatus::Ready => "READY",
        }
    }
}

/// What the gate should see on this bar, and the pending record to keep
/// once the bar has been fully processed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingView {
    pub status: PendingStatus,
    /// Signal handed to the gate: the armed signal while one is pending
    pub gate_signal: SpotSignal,
    pub pending_ok: bool,
    pub next: Option<PendingEntry>,
}

/// Defers an armed signal to the open of the next bar.
///
/// A signal arming on bar N executes no earlier than bar N+1. The record is
/// consumed on the first later bar whatever the gate decides.
pub struct PendingEntryTracker;

impl PendingEntryTracker {
    pub fn observe(
        current: Option<&PendingEntry>,
        bar_epoch: i64,
        signal: &SpotSignal,
    ) -> PendingView {
        match current {
            Some(pending) if bar_epoch > pending.armed_bar_epoch => PendingView {
                status: PendingStatus::Ready,
                gate_signal: pending.armed_signal.clone(),
                pending_ok: true,
                next: None,
            },
            Some(pending) => PendingView {
                status: PendingStatus::Armed,
                gate_signal: pending.armed_signal.clone(),
                pending_ok: false,
                next: Some(pending.clone()),
            },
            None if signal.is_armed() => PendingView {
                status: PendingStatus::Armed,
                gate_signal: signal.clone(),
                pending_ok: false,
                next: Some(PendingEntry {
                    armed_bar_epoch: bar_epoch,
                    armed_signal: signal.clone(),
                }),
            },
            None => PendingView {
                status: PendingStatus::Idle,
                gate_signal: signal.clone(),
                pending_ok: false,
                next: None,
            },
        }
    }
}
