//! Exploration counters reported next to every verdict.

use serde::{Deserialize, Serialize};

/// Counters of one search run.
///
/// `discovered_states` counts every generated state including duplicates;
/// `explored_states` and `checked_states` only the unique ones that were
/// stored and evaluated against the query.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub discovered_states: u64,
    pub explored_states: u64,
    pub checked_states: u64,
    pub peak_waiting_states: u64,
    pub end_waiting_states: u64,
    /// Longest compressed marking key seen, in bytes.
    pub biggest_encoding: usize,
}
