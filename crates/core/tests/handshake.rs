// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::{Arc, Mutex};
use upbus_core::{
    BusLine, BusMetrics, BusObserver, Channel, SimulationConfig, Testbench, Transaction, UpBus,
};

/// Records the write request line after every edge.
#[derive(Debug, Default)]
struct RequestTrace {
    wreq: Mutex<Vec<(u64, bool)>>,
}

impl BusObserver for RequestTrace {
    fn on_edge(&self, cycle: u64, bus: &UpBus, _reset_active: bool) {
        if let Ok(mut v) = self.wreq.lock() {
            v.push((cycle, bus.write.req.get().is_high()));
        }
    }
}

fn bench(numreg: usize) -> Testbench {
    let mut tb = Testbench::new(SimulationConfig::default(), numreg, 2);
    tb.reset().unwrap();
    tb
}

#[test]
fn test_four_register_write_then_read_back() {
    let mut tb = bench(4);
    tb.write_burst(&[0, 1, 2, 3], &[10, 20, 30, 40]).unwrap();
    let values = tb.read_burst(&[0, 1, 2, 3]).unwrap();
    assert_eq!(values, vec![10, 20, 30, 40]);
    assert_eq!(tb.registers().unwrap(), &[10, 20, 30, 40]);
}

#[test]
fn test_reads_return_in_issue_order() {
    let mut tb = bench(8);
    tb.write_burst(&[1, 3, 5, 7], &[100, 300, 500, 700]).unwrap();
    let values = tb.read_burst(&[7, 1, 5, 3, 1]).unwrap();
    assert_eq!(values, vec![700, 100, 500, 300, 100]);
}

#[test]
fn test_single_read_after_single_write() {
    let mut tb = bench(16);
    tb.write(9, 0xDEAD_BEEF).unwrap();
    assert_eq!(tb.read(9).unwrap(), 0xDEAD_BEEF);
    assert_eq!(tb.read(8).unwrap(), 0);
}

#[test]
fn test_repeated_identical_writes_each_complete() {
    let mut tb = bench(4);
    let metrics = Arc::new(BusMetrics::new());
    tb.add_observer(metrics.clone());
    tb.write_burst(&[2, 2, 2], &[5, 5, 5]).unwrap();
    tb.wait_idle().unwrap();
    assert_eq!(metrics.beats_for("master", Channel::Write), 3);
    assert_eq!(metrics.beats_for("slave", Channel::Write), 3);
    assert_eq!(tb.registers().unwrap()[2], 5);
}

#[test]
fn test_burst_keeps_request_high_between_beats() {
    let mut tb = bench(8);
    let trace = Arc::new(RequestTrace::default());
    tb.add_observer(trace.clone());

    tb.write_burst(&[0, 1, 2, 3], &[1, 2, 3, 4]).unwrap();
    tb.wait_idle().unwrap();

    let samples = trace.wreq.lock().unwrap().clone();
    let high: Vec<u64> = samples
        .iter()
        .filter(|(_, req)| *req)
        .map(|(cycle, _)| *cycle)
        .collect();
    assert!(!high.is_empty());
    // One contiguous run of high samples: the line never dropped mid-burst.
    let first = high[0];
    let last = high[high.len() - 1];
    assert_eq!(high.len() as u64, last - first + 1);
    // Two edges per beat while streaming.
    assert_eq!(high.len(), 8);
}

#[test]
fn test_monitor_sees_every_beat() {
    let mut tb = bench(4);
    tb.write_burst(&[0, 1], &[7, 8]).unwrap();
    tb.read_burst(&[1, 0]).unwrap();

    let monitor = tb.monitor().unwrap();
    assert_eq!(
        monitor.observed(Channel::Write),
        &[Transaction::write(0, 7), Transaction::write(1, 8)]
    );
    assert_eq!(
        monitor.observed(Channel::Read),
        &[
            Transaction::read(1).complete(8),
            Transaction::read(0).complete(7)
        ]
    );
}

#[test]
fn test_metrics_count_edges_and_beats() {
    let mut tb = Testbench::new(SimulationConfig::default(), 4, 3);
    let metrics = Arc::new(BusMetrics::new());
    tb.add_observer(metrics.clone());

    tb.reset().unwrap();
    tb.write_burst(&[0, 1, 2, 3], &[10, 20, 30, 40]).unwrap();
    tb.read_burst(&[0, 1, 2, 3]).unwrap();

    assert_eq!(metrics.get_edges(), tb.cycle());
    assert_eq!(metrics.get_reset_edges(), 3);
    for participant in ["master", "slave", "monitor"] {
        assert_eq!(metrics.beats_for(participant, Channel::Write), 4);
        assert_eq!(metrics.beats_for(participant, Channel::Read), 4);
    }
    assert_eq!(metrics.get_beat_reports(), 24);
    assert_eq!(metrics.get_violations(), 0);
    assert!(metrics.get_transitions() > 0);
}

#[test]
fn test_bus_idles_with_lines_low_after_traffic() {
    let mut tb = bench(4);
    tb.write(1, 0xFF).unwrap();
    tb.read(1).unwrap();
    tb.wait_idle().unwrap();
    tb.step().unwrap();

    let sim = tb.simulator();
    for line in BusLine::ALL {
        if line == BusLine::ReadData {
            // Holds the last value served.
            continue;
        }
        assert_eq!(sim.line(line), 0, "{} should be low", line);
    }
    assert!(!sim.is_active());
}
