//! Small utilities to manage bounded history buffers for charts and the console.

use std::collections::VecDeque;

/// Number of samples a chart series keeps.
pub const SERIES_LEN: usize = 20;

/// Value stored in every slot of a cleared series. It sits below the Y axis
/// so an empty chart renders as a trough instead of a zero line.
pub const SENTINEL: f64 = -5.0;

/// Most recent commands kept per server.
pub const COMMAND_HISTORY_CAP: usize = 32;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Round to 2 decimals so float noise does not make the line jitter
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Fixed-length FIFO of chart samples. Always holds exactly [`SERIES_LEN`] slots.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSeries {
    slots: VecDeque<Option<f64>>,
}

impl RollingSeries {
    pub fn new() -> Self {
        Self {
            slots: std::iter::repeat(Some(SENTINEL)).take(SERIES_LEN).collect(),
        }
    }

    /// Append one sample, evicting the oldest. `None` leaves a gap in the line.
    pub fn push(&mut self, v: Option<f64>) {
        let v = v.filter(|x| x.is_finite()).map(round2);
        push_capped(&mut self.slots, v, SERIES_LEN);
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = Some(SENTINEL));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.slots.iter().copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.slots.back().copied().flatten()
    }

    /// Largest real sample (sentinels and gaps excluded).
    pub fn max_value(&self) -> Option<f64> {
        self.iter()
            .flatten()
            .filter(|v| *v > SENTINEL)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    pub fn is_cleared(&self) -> bool {
        self.slots.iter().all(|s| *s == Some(SENTINEL))
    }
}

impl Default for RollingSeries {
    fn default() -> Self {
        Self::new()
    }
}

/// Previously submitted console commands, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandHistory {
    entries: VecDeque<String>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted list (newest first). Extra entries are dropped.
    pub fn from_entries(entries: Vec<String>) -> Self {
        let mut entries: VecDeque<String> = entries.into();
        entries.truncate(COMMAND_HISTORY_CAP);
        Self { entries }
    }

    pub fn push(&mut self, command: String) {
        self.entries.push_front(command);
        self.entries.truncate(COMMAND_HISTORY_CAP);
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_series_is_sentinel_filled() {
        let s = RollingSeries::new();
        assert_eq!(s.len(), SERIES_LEN);
        assert!(s.is_cleared());
        assert_eq!(s.max_value(), None);
    }

    #[test]
    fn push_keeps_last_twenty_in_order() {
        let mut s = RollingSeries::new();
        for i in 0..25 {
            s.push(Some(i as f64));
        }
        let got: Vec<f64> = s.iter().flatten().collect();
        let want: Vec<f64> = (5..25).map(|i| i as f64).collect();
        assert_eq!(got, want);
        assert_eq!(s.latest(), Some(24.0));
    }

    #[test]
    fn push_rounds_to_two_decimals() {
        let mut s = RollingSeries::new();
        s.push(Some(12.345_678));
        s.push(Some(0.1 + 0.2));
        let tail: Vec<Option<f64>> = s.iter().skip(SERIES_LEN - 2).collect();
        assert_eq!(tail, vec![Some(12.35), Some(0.3)]);
    }

    #[test]
    fn null_and_non_finite_samples_become_gaps() {
        let mut s = RollingSeries::new();
        s.push(None);
        s.push(Some(f64::NAN));
        assert_eq!(s.len(), SERIES_LEN);
        assert_eq!(s.latest(), None);
    }

    #[test]
    fn clear_restores_sentinel() {
        let mut s = RollingSeries::new();
        s.push(Some(42.0));
        s.clear();
        assert!(s.is_cleared());
        assert!(s.is_cleared(), "reads must not change the baseline");
    }

    #[test]
    fn history_caps_at_32_newest_first() {
        let mut h = CommandHistory::new();
        for i in 0..33 {
            h.push(format!("cmd{i}"));
        }
        assert_eq!(h.len(), COMMAND_HISTORY_CAP);
        assert_eq!(h.get(0), Some("cmd32"));
        assert_eq!(h.get(31), Some("cmd1"));
    }

    #[test]
    fn history_from_entries_truncates() {
        let entries: Vec<String> = (0..40).map(|i| i.to_string()).collect();
        let h = CommandHistory::from_entries(entries);
        assert_eq!(h.len(), COMMAND_HISTORY_CAP);
        assert_eq!(h.get(0), Some("0"));
    }
}
