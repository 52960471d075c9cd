// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::channel::{Channel, ChannelState, ParticipantCore};
use crate::signals::{ChannelSample, UpBus};
use crate::transaction::Transaction;
use crate::{BusParticipant, EdgeContext, SimResult, SimulationError, Violation};
use std::any::Any;

/// Checks wire-level invariants every clock edge. Drives nothing.
///
/// While reset is active both request lines must read low. Outside reset,
/// acknowledge must never be high while its request is low. Every edge that
/// samples request and acknowledge both high is recorded as an observed beat.
#[derive(Debug)]
pub struct Monitor {
    core: ParticipantCore,
    observed_writes: Vec<Transaction>,
    observed_reads: Vec<Transaction>,
}

impl Monitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ParticipantCore::new(name),
            observed_writes: Vec::new(),
            observed_reads: Vec::new(),
        }
    }

    pub fn observed(&self, channel: Channel) -> &[Transaction] {
        match channel {
            Channel::Write => &self.observed_writes,
            Channel::Read => &self.observed_reads,
        }
    }

    pub fn clear_observed(&mut self) {
        self.observed_writes.clear();
        self.observed_reads.clear();
    }

    fn check(
        &mut self,
        channel: Channel,
        sample: ChannelSample,
        ctx: &EdgeContext<'_>,
    ) -> SimResult<()> {
        let violation = |violation| SimulationError::ProtocolViolation {
            channel,
            cycle: ctx.cycle,
            violation,
        };

        if ctx.reset_active {
            if sample.req {
                return Err(violation(Violation::RequestDuringReset));
            }
            self.core.transition(channel, ChannelState::Idle, ctx);
            self.core.mark_idle(channel);
            return Ok(());
        }

        if sample.ack && !sample.req {
            return Err(violation(Violation::AckWithoutRequest));
        }

        let seen = match (sample.req, sample.ack) {
            (false, _) => ChannelState::Idle,
            (true, false) => ChannelState::Request,
            (true, true) => ChannelState::Acknowledged,
        };
        self.core.transition(channel, seen, ctx);

        match seen {
            ChannelState::Idle => self.core.mark_idle(channel),
            ChannelState::Acknowledged => {
                let beat = match channel {
                    Channel::Write => Transaction::write(sample.addr, sample.data),
                    Channel::Read => Transaction::read(sample.addr).complete(sample.data),
                };
                ctx.notify_beat(self.core.name(), channel, &beat);
                match channel {
                    Channel::Write => self.observed_writes.push(beat),
                    Channel::Read => self.observed_reads.push(beat),
                }
            }
            ChannelState::Request => {}
        }
        Ok(())
    }
}

impl BusParticipant for Monitor {
    fn core(&self) -> &ParticipantCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ParticipantCore {
        &mut self.core
    }

    fn on_clock_edge(&mut self, ctx: &EdgeContext<'_>, bus: &mut UpBus) -> SimResult<()> {
        for channel in Channel::ALL {
            let sample = bus.channel(channel).sample();
            self.check(channel, sample, ctx)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
