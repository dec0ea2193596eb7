//! Per-probe diagnostics.
//!
//! The runner reports every threshold probe to a [`TraceSink`] passed in by
//! the caller, so traces can be captured without any global state.

use std::sync::mpsc::Sender;

/// Result of probing one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProbeOutcome {
    /// The configuration LP reached the threshold.
    Feasible,
    /// The threshold is not achievable.
    Infeasible,
    /// The per-probe budget ran out; treated as infeasible.
    Timeout,
    /// The LP backend failed; treated as infeasible.
    NumericalFailure,
}

impl ProbeOutcome {
    pub fn is_feasible(self) -> bool {
        self == ProbeOutcome::Feasible
    }
}

/// One binary-search step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbeRecord {
    /// Zero-based probe index.
    pub iteration: usize,
    /// Threshold that was probed.
    pub threshold: f64,
    pub outcome: ProbeOutcome,
    /// Candidate configurations handed to the LP.
    pub configurations: usize,
    /// Wall-clock time of the probe in milliseconds.
    pub solve_time_ms: u64,
}

/// Receiver of probe records.
pub trait TraceSink {
    fn record(&mut self, record: &ProbeRecord);
}

/// Discards all records.
impl TraceSink for () {
    fn record(&mut self, _record: &ProbeRecord) {}
}

impl TraceSink for Vec<ProbeRecord> {
    fn record(&mut self, record: &ProbeRecord) {
        self.push(record.clone());
    }
}

/// Forwards records over a channel; a closed receiver is ignored.
impl TraceSink for Sender<ProbeRecord> {
    fn record(&mut self, record: &ProbeRecord) {
        let _ = self.send(record.clone());
    }
}
