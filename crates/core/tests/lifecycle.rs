// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use upbus_core::{BusLine, BusParticipant, Channel, ChannelState, SimulationConfig, Testbench};

fn bench(numreg: usize) -> Testbench {
    let mut tb = Testbench::new(SimulationConfig::default(), numreg, 2);
    tb.reset().unwrap();
    tb
}

#[test]
fn test_idle_master_restart_settles_in_one_edge() {
    let mut tb = bench(4);
    tb.restart_master().unwrap();
    let master = tb.master().unwrap();
    assert_eq!(master.core().generation(), 1);
    assert!(!master.is_idle(Channel::Write));

    tb.step().unwrap();
    let master = tb.master().unwrap();
    assert!(master.is_idle(Channel::Write));
    assert!(master.is_idle(Channel::Read));
    for line in [
        BusLine::WriteRequest,
        BusLine::WriteAddress,
        BusLine::WriteData,
        BusLine::ReadRequest,
        BusLine::ReadAddress,
    ] {
        assert_eq!(tb.simulator().line(line), 0);
    }
}

#[test]
fn test_restart_mid_burst_keeps_queued_beats() {
    let mut tb = bench(8);
    tb.write_burst(&[1, 2, 3], &[11, 22, 33]).unwrap();
    tb.step().unwrap();
    assert_eq!(tb.master().unwrap().state(Channel::Write), ChannelState::Request);

    tb.restart_master().unwrap();
    assert_eq!(tb.master().unwrap().pending(Channel::Write), 2);

    tb.wait_idle().unwrap();
    let regs = tb.registers().unwrap();
    assert_eq!(&regs[2..4], &[22, 33]);
    assert_eq!(tb.read_burst(&[2, 3]).unwrap(), vec![22, 33]);
}

#[test]
fn test_restart_all_then_traffic_resumes() {
    let mut tb = bench(4);
    tb.write(0, 1).unwrap();
    tb.wait_idle().unwrap();

    tb.restart_all();
    for p in tb.simulator().participants() {
        assert_eq!(p.core().generation(), 1, "{}", p.name());
        assert!(!p.is_active());
    }

    tb.write(1, 2).unwrap();
    assert_eq!(tb.read_burst(&[0, 1]).unwrap(), vec![1, 2]);
}

#[test]
fn test_slave_restart_answers_standing_request() {
    let mut tb = bench(4);
    tb.write(3, 9).unwrap();
    tb.step().unwrap();
    // Request is on the wire; a fresh slave task picks it up.
    tb.restart_slave().unwrap();
    tb.wait_idle().unwrap();
    assert_eq!(tb.registers().unwrap()[3], 9);
}

#[test]
fn test_monitor_restart_keeps_checking() {
    let mut tb = bench(4);
    tb.restart_monitor().unwrap();
    tb.run(2).unwrap();
    tb.force(BusLine::WriteAcknowledge, 1).unwrap();
    assert!(tb.step().is_err());
}

#[test]
fn test_active_follows_channel_states() {
    let mut tb = bench(4);
    assert!(!tb.simulator().is_active());
    tb.write(0, 5).unwrap();
    tb.step().unwrap();
    assert!(tb.master().unwrap().is_active());
    tb.wait_idle().unwrap();
    assert!(!tb.master().unwrap().is_active());
}

#[test]
fn test_restart_mid_read_burst_loses_only_the_wire_beat() {
    let mut tb = bench(8);
    tb.write_burst(&[4, 5, 6], &[40, 50, 60]).unwrap();
    tb.wait_idle().unwrap();

    let tickets = tb
        .master_mut()
        .unwrap()
        .enqueue_read_burst(&[4, 5, 6])
        .unwrap();
    tb.step().unwrap();
    assert_eq!(tb.master().unwrap().state(Channel::Read), ChannelState::Request);

    tb.restart_master().unwrap();
    assert_eq!(tb.master().unwrap().pending(Channel::Read), 2);

    tb.wait_idle().unwrap();
    let master = tb.master_mut().unwrap();
    assert!(!master.has_response(tickets[0]));
    assert_eq!(master.responses_len(), 2);

    let (t1, r1) = master.pop_response().unwrap();
    let (t2, r2) = master.pop_response().unwrap();
    assert_eq!((t1, r1.address(), r1.data()), (tickets[1], 5, Some(50)));
    assert_eq!((t2, r2.address(), r2.data()), (tickets[2], 6, Some(60)));
    assert!(master.pop_response().is_none());
    assert!(!master.has_response(tickets[0]));

    // The bus keeps working after the lost beat.
    tb.run(3).unwrap();
    assert!(!tb.master().unwrap().has_response(tickets[0]));
    assert_eq!(tb.read(4).unwrap(), 40);
}

#[test]
fn test_slave_restart_on_quiet_bus_reports_idle() {
    let mut tb = bench(4);
    tb.write(1, 1).unwrap();
    tb.wait_idle().unwrap();

    tb.restart_slave().unwrap();
    let slave = tb.slave().unwrap();
    assert!(!slave.core().is_idle(Channel::Write));
    assert!(!slave.core().is_idle(Channel::Read));

    tb.run(5).unwrap();
    let slave = tb.slave().unwrap();
    assert!(slave.core().is_idle(Channel::Write));
    assert!(slave.core().is_idle(Channel::Read));
    assert_eq!(slave.core().generation(), 1);
}
