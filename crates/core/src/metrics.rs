// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::channel::{Channel, ChannelState};
use crate::signals::UpBus;
use crate::transaction::Transaction;
use crate::{BusObserver, SimulationError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Counts edges, beats, state transitions and violations.
#[derive(Debug)]
pub struct BusMetrics {
    edge_count: AtomicU64,
    reset_edge_count: AtomicU64,
    beat_reports: AtomicU64,
    transition_count: AtomicU64,
    violation_count: AtomicU64,
    beats_by_participant: Mutex<HashMap<(String, Channel), u64>>,
    start_time: Instant,
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BusMetrics {
    pub fn new() -> Self {
        Self {
            edge_count: AtomicU64::new(0),
            reset_edge_count: AtomicU64::new(0),
            beat_reports: AtomicU64::new(0),
            transition_count: AtomicU64::new(0),
            violation_count: AtomicU64::new(0),
            beats_by_participant: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn reset(&self) {
        self.edge_count.store(0, Ordering::SeqCst);
        self.reset_edge_count.store(0, Ordering::SeqCst);
        self.beat_reports.store(0, Ordering::SeqCst);
        self.transition_count.store(0, Ordering::SeqCst);
        self.violation_count.store(0, Ordering::SeqCst);
        if let Ok(mut m) = self.beats_by_participant.lock() {
            m.clear();
        }
    }

    pub fn get_edges(&self) -> u64 {
        self.edge_count.load(Ordering::SeqCst)
    }

    pub fn get_reset_edges(&self) -> u64 {
        self.reset_edge_count.load(Ordering::SeqCst)
    }

    /// Beat reports from all participants. A beat that a master completes, a
    /// slave serves and a monitor sees is reported three times.
    pub fn get_beat_reports(&self) -> u64 {
        self.beat_reports.load(Ordering::SeqCst)
    }

    pub fn get_transitions(&self) -> u64 {
        self.transition_count.load(Ordering::SeqCst)
    }

    pub fn get_violations(&self) -> u64 {
        self.violation_count.load(Ordering::SeqCst)
    }

    /// Beats reported by one participant on one channel.
    pub fn beats_for(&self, participant: &str, channel: Channel) -> u64 {
        self.beats_by_participant
            .lock()
            .ok()
            .and_then(|m| m.get(&(participant.to_string(), channel)).copied())
            .unwrap_or(0)
    }

    pub fn get_edges_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_edges() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl BusObserver for BusMetrics {
    fn on_edge(&self, _cycle: u64, _bus: &UpBus, reset_active: bool) {
        self.edge_count.fetch_add(1, Ordering::SeqCst);
        if reset_active {
            self.reset_edge_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_state_change(
        &self,
        _participant: &str,
        _channel: Channel,
        _from: ChannelState,
        _to: ChannelState,
    ) {
        self.transition_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_beat(&self, participant: &str, channel: Channel, _transaction: &Transaction) {
        self.beat_reports.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut m) = self.beats_by_participant.lock() {
            *m.entry((participant.to_string(), channel)).or_insert(0) += 1;
        }
    }

    fn on_violation(&self, _error: &SimulationError) {
        self.violation_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Violation;

    #[test]
    fn test_counts_and_reset() {
        let metrics = BusMetrics::new();
        let bus = UpBus::new();
        metrics.on_edge(1, &bus, true);
        metrics.on_edge(2, &bus, false);
        metrics.on_state_change("m", Channel::Write, ChannelState::Idle, ChannelState::Request);
        metrics.on_beat("m", Channel::Write, &Transaction::write(1, 2));
        metrics.on_beat("s", Channel::Write, &Transaction::write(1, 2));
        metrics.on_beat("m", Channel::Read, &Transaction::read(1).complete(2));
        metrics.on_violation(&SimulationError::ProtocolViolation {
            channel: Channel::Read,
            cycle: 2,
            violation: Violation::AckWithoutRequest,
        });

        assert_eq!(metrics.get_edges(), 2);
        assert_eq!(metrics.get_reset_edges(), 1);
        assert_eq!(metrics.get_transitions(), 1);
        assert_eq!(metrics.get_beat_reports(), 3);
        assert_eq!(metrics.beats_for("m", Channel::Write), 1);
        assert_eq!(metrics.beats_for("m", Channel::Read), 1);
        assert_eq!(metrics.beats_for("monitor", Channel::Write), 0);
        assert_eq!(metrics.get_violations(), 1);
        assert!(metrics.get_edges_per_second() >= 0.0);

        metrics.reset();
        assert_eq!(metrics.get_edges(), 0);
        assert_eq!(metrics.get_reset_edges(), 0);
        assert_eq!(metrics.get_transitions(), 0);
        assert_eq!(metrics.get_beat_reports(), 0);
        assert_eq!(metrics.beats_for("m", Channel::Write), 0);
        assert_eq!(metrics.get_violations(), 0);
    }

    #[test]
    fn test_edge_rate_is_zero_before_any_edge() {
        let metrics = BusMetrics::new();
        assert_eq!(metrics.get_edges_per_second(), 0.0);
    }
}
