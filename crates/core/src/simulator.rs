// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::config::SimulationConfig;
use crate::signals::{BusLine, DigitalLevel, UpBus};
use crate::{BusObserver, BusParticipant, EdgeContext, SimResult, SimulationError};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(usize);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Single clock domain driving a set of participants on one uP bus.
///
/// Each [`step`](Simulator::step) is one rising clock edge:
/// 1. every participant samples the committed lines and schedules drives,
/// 2. all drives commit together,
/// 3. participants react to request bundles that changed, possibly setting
///    lines immediately,
/// 4. observers see the settled bus.
///
/// The first fatal error halts the simulator; later steps report it again.
pub struct Simulator {
    pub bus: UpBus,
    config: SimulationConfig,
    resetn: DigitalLevel,
    cycle: u64,
    participants: Vec<Box<dyn BusParticipant>>,
    observers: Vec<Arc<dyn BusObserver>>,
    halted: Option<SimulationError>,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            bus: UpBus::new(),
            config,
            resetn: DigitalLevel::High,
            cycle: 0,
            participants: Vec::new(),
            observers: Vec::new(),
            halted: None,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn add_participant(&mut self, participant: Box<dyn BusParticipant>) -> ParticipantId {
        tracing::info!("uP {} attached", participant.name());
        self.participants.push(participant);
        ParticipantId(self.participants.len() - 1)
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BusObserver>) {
        self.observers.push(observer);
    }

    pub fn participant<T: BusParticipant + 'static>(&self, id: ParticipantId) -> SimResult<&T> {
        self.participants
            .get(id.0)
            .and_then(|p| p.as_any().downcast_ref::<T>())
            .ok_or(SimulationError::UnknownParticipant(id))
    }

    pub fn participant_mut<T: BusParticipant + 'static>(
        &mut self,
        id: ParticipantId,
    ) -> SimResult<&mut T> {
        self.participants
            .get_mut(id.0)
            .and_then(|p| p.as_any_mut().downcast_mut::<T>())
            .ok_or(SimulationError::UnknownParticipant(id))
    }

    pub fn participants(&self) -> impl Iterator<Item = &dyn BusParticipant> {
        self.participants.iter().map(|p| p.as_ref())
    }

    pub fn is_active(&self) -> bool {
        self.participants.iter().any(|p| p.is_active())
    }

    pub fn reset_active(&self) -> bool {
        self.resetn == DigitalLevel::Low
    }

    pub fn halted(&self) -> Option<&SimulationError> {
        self.halted.as_ref()
    }

    /// Drive the active-low reset. Assertion takes effect immediately:
    /// participants force their outputs low before the next edge.
    pub fn set_reset(&mut self, active: bool) {
        let level = DigitalLevel::from(!active);
        if level == self.resetn {
            return;
        }
        self.resetn = level;
        tracing::debug!(
            "reset {} at cycle {}",
            if active { "asserted" } else { "released" },
            self.cycle
        );
        if active {
            let ctx = EdgeContext {
                cycle: self.cycle,
                reset_active: true,
                observers: &self.observers,
            };
            for p in self.participants.iter_mut() {
                p.on_reset(&ctx, &mut self.bus);
            }
        }
    }

    fn halt(&mut self, err: SimulationError) -> SimulationError {
        tracing::error!("{}", err);
        for observer in &self.observers {
            observer.on_violation(&err);
        }
        self.halted = Some(err.clone());
        err
    }

    /// Evaluate one rising clock edge.
    pub fn step(&mut self) -> SimResult<()> {
        if let Some(err) = &self.halted {
            return Err(SimulationError::Halted(Box::new(err.clone())));
        }

        self.cycle += 1;
        let result = {
            let ctx = EdgeContext {
                cycle: self.cycle,
                reset_active: self.reset_active(),
                observers: &self.observers,
            };
            let bus = &mut self.bus;
            self.participants
                .iter_mut()
                .try_for_each(|p| p.on_clock_edge(&ctx, bus))
        };
        if let Err(err) = result {
            return Err(self.halt(err));
        }

        let changes = self.bus.commit();
        for channel in changes.channels() {
            for p in self.participants.iter_mut() {
                p.on_request_change(channel, &mut self.bus);
            }
        }

        let reset_active = self.reset_active();
        for observer in &self.observers {
            observer.on_edge(self.cycle, &self.bus, reset_active);
        }
        Ok(())
    }

    pub fn run(&mut self, cycles: u64) -> SimResult<()> {
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }

    /// Step until `done` holds, checking before every edge. Returns the number
    /// of edges taken. Gives up once the configured watchdog is exceeded.
    pub fn run_until<F>(&mut self, mut done: F) -> SimResult<u64>
    where
        F: FnMut(&Simulator) -> bool,
    {
        let mut elapsed = 0;
        while !done(self) {
            if let Some(limit) = self.config.watchdog_cycles {
                if elapsed >= limit {
                    tracing::warn!("watchdog expired after {} cycles", elapsed);
                    return Err(SimulationError::WatchdogExpired { cycles: elapsed });
                }
            }
            self.step()?;
            elapsed += 1;
        }
        Ok(elapsed)
    }

    pub fn set_watchdog(&mut self, cycles: Option<u64>) {
        self.config.watchdog_cycles = cycles;
    }

    pub fn restart(&mut self, id: ParticipantId) -> SimResult<()> {
        let ctx = EdgeContext {
            cycle: self.cycle,
            reset_active: self.reset_active(),
            observers: &self.observers,
        };
        let p = self
            .participants
            .get_mut(id.0)
            .ok_or(SimulationError::UnknownParticipant(id))?;
        p.restart(&ctx, &mut self.bus);
        Ok(())
    }

    pub fn restart_all(&mut self) {
        let ctx = EdgeContext {
            cycle: self.cycle,
            reset_active: self.reset_active(),
            observers: &self.observers,
        };
        for p in self.participants.iter_mut() {
            p.restart(&ctx, &mut self.bus);
        }
    }

    /// Set a bus line immediately, outside any participant. Meant for fault
    /// injection.
    pub fn force(&mut self, line: BusLine, value: u32) -> SimResult<()> {
        self.config.widths.check(line, value)?;
        tracing::debug!("force {} = {:#x} at cycle {}", line, value, self.cycle);
        self.bus.force(line, value);
        Ok(())
    }

    pub fn line(&self, line: BusLine) -> u32 {
        self.bus.line(line)
    }
}
