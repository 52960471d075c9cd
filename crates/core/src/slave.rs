// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::channel::{Channel, ChannelState, ParticipantCore};
use crate::signals::{ChannelSignals, DigitalLevel, UpBus};
use crate::transaction::Transaction;
use crate::{BusParticipant, EdgeContext, SimResult, SimulationError};
use std::any::Any;

pub use upbus_config::DEFAULT_NUMREG;

/// Fixed-depth register file, zeroed at construction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RegisterFile {
    regs: Vec<u32>,
}

impl RegisterFile {
    pub fn new(numreg: usize) -> Self {
        Self {
            regs: vec![0; numreg],
        }
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    fn slot(&self, address: u32) -> SimResult<usize> {
        let index = address as usize;
        if index < self.regs.len() {
            Ok(index)
        } else {
            Err(SimulationError::AddressOutOfRange {
                address,
                numreg: self.regs.len(),
            })
        }
    }

    pub fn read(&self, address: u32) -> SimResult<u32> {
        Ok(self.regs[self.slot(address)?])
    }

    pub fn write(&mut self, address: u32, value: u32) -> SimResult<()> {
        let index = self.slot(address)?;
        self.regs[index] = value;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.regs
    }
}

/// Responder half of one channel.
///
/// Armed by a change in the request bundle and answers on the following
/// clock edge. An answer is never left standing across a bundle change:
/// acknowledge drops the moment the bundle moves.
#[derive(Debug)]
struct ResponderChannel {
    channel: Channel,
    armed: bool,
}

impl ResponderChannel {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            armed: false,
        }
    }

    fn request_changed(&mut self, lines: &mut ChannelSignals) {
        self.armed = true;
        if lines.ack.get().is_high() {
            lines.ack.set_immediate(DigitalLevel::Low);
        }
    }

    fn clock_edge(
        &mut self,
        core: &mut ParticipantCore,
        ctx: &EdgeContext<'_>,
        lines: &mut ChannelSignals,
        registers: &mut RegisterFile,
    ) -> SimResult<Option<Transaction>> {
        let ch = self.channel;
        if ctx.reset_active {
            self.armed = false;
            lines.ack.drive(DigitalLevel::Low);
            core.transition(ch, ChannelState::Idle, ctx);
            core.mark_idle(ch);
            return Ok(None);
        }

        let sample = lines.sample();
        if !std::mem::take(&mut self.armed) {
            // A quiet channel never gets armed again after a restart.
            if !sample.req {
                core.transition(ch, ChannelState::Idle, ctx);
                core.mark_idle(ch);
            }
            return Ok(None);
        }

        if !sample.req {
            lines.ack.drive(DigitalLevel::Low);
            core.transition(ch, ChannelState::Idle, ctx);
            core.mark_idle(ch);
            return Ok(None);
        }

        let served = match ch {
            Channel::Write => {
                tracing::debug!("{}: REGISTER WRITE {:#x}", core.name(), sample.addr);
                registers.write(sample.addr, sample.data)?;
                Transaction::write(sample.addr, sample.data)
            }
            Channel::Read => {
                tracing::debug!("{}: REGISTER READ {:#x}", core.name(), sample.addr);
                let value = registers.read(sample.addr)?;
                lines.data.drive(value);
                Transaction::read(sample.addr).complete(value)
            }
        };
        lines.ack.drive(DigitalLevel::High);
        core.transition(ch, ChannelState::Acknowledged, ctx);
        Ok(Some(served))
    }
}

/// Answers master reads and writes against an in-memory register file.
#[derive(Debug)]
pub struct EchoSlave {
    core: ParticipantCore,
    registers: RegisterFile,
    write: ResponderChannel,
    read: ResponderChannel,
}

impl EchoSlave {
    pub fn new(name: impl Into<String>, numreg: usize) -> Self {
        Self {
            core: ParticipantCore::new(name),
            registers: RegisterFile::new(numreg),
            write: ResponderChannel::new(Channel::Write),
            read: ResponderChannel::new(Channel::Read),
        }
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Direct register access that bypasses the bus.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    fn responder(&mut self, channel: Channel) -> &mut ResponderChannel {
        match channel {
            Channel::Write => &mut self.write,
            Channel::Read => &mut self.read,
        }
    }
}

impl BusParticipant for EchoSlave {
    fn core(&self) -> &ParticipantCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ParticipantCore {
        &mut self.core
    }

    fn on_clock_edge(&mut self, ctx: &EdgeContext<'_>, bus: &mut UpBus) -> SimResult<()> {
        let name = self.core.name().to_string();
        if let Some(t) =
            self.write
                .clock_edge(&mut self.core, ctx, &mut bus.write, &mut self.registers)?
        {
            ctx.notify_beat(&name, Channel::Write, &t);
        }
        if let Some(t) =
            self.read
                .clock_edge(&mut self.core, ctx, &mut bus.read, &mut self.registers)?
        {
            ctx.notify_beat(&name, Channel::Read, &t);
        }
        Ok(())
    }

    fn on_request_change(&mut self, channel: Channel, bus: &mut UpBus) {
        self.responder(channel)
            .request_changed(bus.channel_mut(channel));
    }

    fn on_reset(&mut self, ctx: &EdgeContext<'_>, bus: &mut UpBus) {
        for channel in Channel::ALL {
            self.responder(channel).armed = false;
            bus.channel_mut(channel).ack.set_immediate(DigitalLevel::Low);
            self.core.transition(channel, ChannelState::Idle, ctx);
        }
    }

    fn restart(&mut self, ctx: &EdgeContext<'_>, bus: &mut UpBus) {
        // A request already on the wire gets answered by the new task.
        for channel in Channel::ALL {
            self.responder(channel).armed = bus.channel(channel).req.get().is_high();
        }
        self.core.restart(ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
