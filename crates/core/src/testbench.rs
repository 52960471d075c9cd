// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! One master, one echo slave and one monitor on a shared bus, with blocking
//! helpers that advance the clock until the requested work is done.

use crate::channel::Channel;
use crate::config::SimulationConfig;
use crate::master::Master;
use crate::monitor::Monitor;
use crate::signals::BusLine;
use crate::simulator::{ParticipantId, Simulator};
use crate::slave::EchoSlave;
use crate::{BusObserver, SimResult, SimulationError};
use std::sync::Arc;
use upbus_config::BenchConfig;

pub const MASTER_NAME: &str = "master";
pub const SLAVE_NAME: &str = "slave";
pub const MONITOR_NAME: &str = "monitor";

pub struct Testbench {
    sim: Simulator,
    master: ParticipantId,
    slave: ParticipantId,
    monitor: ParticipantId,
    reset_cycles: u64,
}

impl Testbench {
    pub fn new(config: SimulationConfig, numreg: usize, reset_cycles: u64) -> Self {
        let widths = config.widths;
        let mut sim = Simulator::new(config);
        let master = sim.add_participant(Box::new(Master::new(MASTER_NAME, widths)));
        let slave = sim.add_participant(Box::new(EchoSlave::new(SLAVE_NAME, numreg)));
        let monitor = sim.add_participant(Box::new(Monitor::new(MONITOR_NAME)));
        Self {
            sim,
            master,
            slave,
            monitor,
            reset_cycles,
        }
    }

    pub fn from_bench_config(bench: &BenchConfig) -> Self {
        Self::new(
            SimulationConfig::from(bench),
            bench.numreg,
            bench.reset_cycles,
        )
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn simulator_mut(&mut self) -> &mut Simulator {
        &mut self.sim
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BusObserver>) {
        self.sim.add_observer(observer);
    }

    pub fn master(&self) -> SimResult<&Master> {
        self.sim.participant(self.master)
    }

    pub fn master_mut(&mut self) -> SimResult<&mut Master> {
        self.sim.participant_mut(self.master)
    }

    pub fn slave(&self) -> SimResult<&EchoSlave> {
        self.sim.participant(self.slave)
    }

    pub fn monitor(&self) -> SimResult<&Monitor> {
        self.sim.participant(self.monitor)
    }

    pub fn cycle(&self) -> u64 {
        self.sim.cycle()
    }

    pub fn step(&mut self) -> SimResult<()> {
        self.sim.step()
    }

    pub fn run(&mut self, cycles: u64) -> SimResult<()> {
        self.sim.run(cycles)
    }

    /// Hold reset for the configured number of edges, then release it.
    pub fn reset(&mut self) -> SimResult<()> {
        self.reset_for(self.reset_cycles)
    }

    pub fn reset_for(&mut self, cycles: u64) -> SimResult<()> {
        tracing::info!("reset for {} cycles", cycles);
        self.sim.set_reset(true);
        let held = self.sim.run(cycles);
        self.sim.set_reset(false);
        held
    }

    /// Queue one write. Returns without waiting for the bus.
    pub fn write(&mut self, address: u32, data: u32) -> SimResult<()> {
        self.master_mut()?.enqueue_write(address, data)
    }

    pub fn write_burst(&mut self, addresses: &[u32], data: &[u32]) -> SimResult<()> {
        self.master_mut()?.enqueue_write_burst(addresses, data)
    }

    /// Read one register. Writes queued earlier land first.
    pub fn read(&mut self, address: u32) -> SimResult<u32> {
        match self.read_burst(&[address])?.as_slice() {
            [value] => Ok(*value),
            _ => Err(SimulationError::MissingResponse { address }),
        }
    }

    /// Read registers in list order. Writes queued earlier land first.
    pub fn read_burst(&mut self, addresses: &[u32]) -> SimResult<Vec<u32>> {
        let master = self.master;
        self.sim.run_until(|sim| {
            sim.participant::<Master>(master)
                .map_or(true, |m| m.is_drained(Channel::Write))
        })?;

        let tickets = self.master_mut()?.enqueue_read_burst(addresses)?;
        let pending = tickets.clone();
        self.sim.run_until(|sim| {
            sim.participant::<Master>(master)
                .map_or(true, |m| pending.iter().all(|&t| m.has_response(t)))
        })?;

        let m = self.master_mut()?;
        tickets
            .into_iter()
            .zip(addresses)
            .map(|(t, &address)| {
                m.take_response(t)
                    .and_then(|r| r.data())
                    .ok_or(SimulationError::MissingResponse { address })
            })
            .collect()
    }

    /// Wait until the master has no queued or in-flight work on either channel
    /// and both channels have announced idle. Returns the edges taken.
    pub fn wait_idle(&mut self) -> SimResult<u64> {
        let master = self.master;
        self.sim.run_until(|sim| {
            sim.participant::<Master>(master).map_or(true, |m| {
                Channel::ALL
                    .into_iter()
                    .all(|ch| m.is_idle(ch) && m.is_drained(ch))
            })
        })
    }

    pub fn registers(&self) -> SimResult<&[u32]> {
        Ok(self.slave()?.registers().as_slice())
    }

    pub fn restart_master(&mut self) -> SimResult<()> {
        self.sim.restart(self.master)
    }

    pub fn restart_slave(&mut self) -> SimResult<()> {
        self.sim.restart(self.slave)
    }

    pub fn restart_monitor(&mut self) -> SimResult<()> {
        self.sim.restart(self.monitor)
    }

    pub fn restart_all(&mut self) {
        self.sim.restart_all();
    }

    pub fn force(&mut self, line: BusLine, value: u32) -> SimResult<()> {
        self.sim.force(line, value)
    }

    pub fn set_watchdog(&mut self, cycles: Option<u64>) {
        self.sim.set_watchdog(cycles);
    }
}
