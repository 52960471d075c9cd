// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Bus master: queues caller reads and writes and walks each channel through
//! the request/acknowledge handshake.
//!
//! Per channel and clock edge, with the acknowledge line sampled before the edge:
//!
//! - `IDLE`: pop a queued beat and put it on the wire with request high, or
//!   drive request/address/data to zero and mark the channel idle.
//! - `REQUEST` / `ACKNOWLEDGED`: without acknowledge, hold. With acknowledge
//!   the beat on the wire is complete (reads capture the data line); the next
//!   queued beat replaces it with request still high, or the channel drops
//!   back to `IDLE`.

use crate::channel::{Channel, ChannelState, ParticipantCore};
use crate::config::BusWidths;
use crate::signals::{BusLine, ChannelSignals, DigitalLevel, UpBus};
use crate::transaction::{ReadTicket, Transaction};
use crate::{BusParticipant, EdgeContext, SimResult, SimulationError};
use std::any::Any;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
struct Beat {
    seq: u64,
    transaction: Transaction,
}

/// Requester half of one channel.
#[derive(Debug)]
struct RequesterChannel {
    channel: Channel,
    queue: VecDeque<Beat>,
    in_flight: Option<Beat>,
}

impl RequesterChannel {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            queue: VecDeque::new(),
            in_flight: None,
        }
    }

    fn is_drained(&self, core: &ParticipantCore) -> bool {
        self.queue.is_empty()
            && self.in_flight.is_none()
            && core.state(self.channel) == ChannelState::Idle
    }

    fn put_on_wire(&self, lines: &mut ChannelSignals, transaction: &Transaction) {
        lines.present();
        lines.req.drive(DigitalLevel::High);
        lines.addr.drive(transaction.address());
        if self.channel == Channel::Write {
            lines.data.drive(transaction.data().unwrap_or_default());
        }
    }

    fn drive_idle(&self, lines: &mut ChannelSignals) {
        lines.req.drive(DigitalLevel::Low);
        lines.addr.drive(0);
        if self.channel == Channel::Write {
            lines.data.drive(0);
        }
    }

    fn abandon(&mut self, owner: &str, why: &str) {
        if let Some(beat) = self.in_flight.take() {
            tracing::warn!(
                "{}: {} beat #{} {} lost on {}",
                owner,
                self.channel,
                beat.seq,
                beat.transaction,
                why
            );
        }
    }

    /// Evaluate one clock edge. Returns the beat completed on this edge, if any.
    fn clock_edge(
        &mut self,
        core: &mut ParticipantCore,
        ctx: &EdgeContext<'_>,
        lines: &mut ChannelSignals,
    ) -> Option<Beat> {
        let ch = self.channel;
        if ctx.reset_active {
            self.abandon(core.name(), "reset");
            self.drive_idle(lines);
            core.transition(ch, ChannelState::Idle, ctx);
            core.mark_idle(ch);
            return None;
        }

        let sample = lines.sample();
        match core.state(ch) {
            ChannelState::Idle => {
                if let Some(beat) = self.queue.pop_front() {
                    self.put_on_wire(lines, &beat.transaction);
                    self.in_flight = Some(beat);
                    core.transition(ch, ChannelState::Request, ctx);
                } else {
                    core.mark_idle(ch);
                    self.drive_idle(lines);
                }
                None
            }
            ChannelState::Request | ChannelState::Acknowledged => {
                if !sample.ack {
                    return None;
                }

                let done = self.in_flight.take().map(|mut beat| {
                    if ch == Channel::Read {
                        beat.transaction = beat.transaction.complete(sample.data);
                    }
                    beat
                });

                if let Some(next) = self.queue.pop_front() {
                    self.put_on_wire(lines, &next.transaction);
                    self.in_flight = Some(next);
                    core.transition(ch, ChannelState::Acknowledged, ctx);
                } else {
                    self.drive_idle(lines);
                    core.transition(ch, ChannelState::Idle, ctx);
                    core.mark_idle(ch);
                }
                done
            }
        }
    }
}

/// Drives slave devices over the uP bus.
#[derive(Debug)]
pub struct Master {
    core: ParticipantCore,
    widths: BusWidths,
    write: RequesterChannel,
    read: RequesterChannel,
    responses: VecDeque<(ReadTicket, Transaction)>,
    next_seq: u64,
}

impl Master {
    pub fn new(name: impl Into<String>, widths: BusWidths) -> Self {
        Self {
            core: ParticipantCore::new(name),
            widths,
            write: RequesterChannel::new(Channel::Write),
            read: RequesterChannel::new(Channel::Read),
            responses: VecDeque::new(),
            next_seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Queue one write. Completion is fire-and-forget for the caller.
    pub fn enqueue_write(&mut self, address: u32, data: u32) -> SimResult<()> {
        self.widths.check(BusLine::WriteAddress, address)?;
        self.widths.check(BusLine::WriteData, data)?;
        let seq = self.next_seq();
        self.write.queue.push_back(Beat {
            seq,
            transaction: Transaction::write(address, data),
        });
        self.core.clear_idle(Channel::Write);
        Ok(())
    }

    /// Queue writes pairwise in list order. Nothing is queued if any pair is invalid.
    pub fn enqueue_write_burst(&mut self, addresses: &[u32], data: &[u32]) -> SimResult<()> {
        if addresses.len() != data.len() {
            tracing::error!("Address and data vector must be the same length");
            return Err(SimulationError::LengthMismatch {
                addresses: addresses.len(),
                data: data.len(),
            });
        }
        for (&a, &d) in addresses.iter().zip(data) {
            self.widths.check(BusLine::WriteAddress, a)?;
            self.widths.check(BusLine::WriteData, d)?;
        }
        for (&a, &d) in addresses.iter().zip(data) {
            self.enqueue_write(a, d)?;
        }
        Ok(())
    }

    /// Queue one read. Its data arrives on the response queue under the returned ticket.
    pub fn enqueue_read(&mut self, address: u32) -> SimResult<ReadTicket> {
        self.widths.check(BusLine::ReadAddress, address)?;
        let seq = self.next_seq();
        self.read.queue.push_back(Beat {
            seq,
            transaction: Transaction::read(address),
        });
        self.core.clear_idle(Channel::Read);
        Ok(ReadTicket(seq))
    }

    pub fn enqueue_read_burst(&mut self, addresses: &[u32]) -> SimResult<Vec<ReadTicket>> {
        for &a in addresses {
            self.widths.check(BusLine::ReadAddress, a)?;
        }
        addresses.iter().map(|&a| self.enqueue_read(a)).collect()
    }

    /// Oldest completed read, in issue order.
    pub fn pop_response(&mut self) -> Option<(ReadTicket, Transaction)> {
        self.responses.pop_front()
    }

    pub fn has_response(&self, ticket: ReadTicket) -> bool {
        self.responses.iter().any(|(t, _)| *t == ticket)
    }

    /// Remove the response for `ticket`, if it has arrived.
    pub fn take_response(&mut self, ticket: ReadTicket) -> Option<Transaction> {
        let index = self.responses.iter().position(|(t, _)| *t == ticket)?;
        self.responses.remove(index).map(|(_, transaction)| transaction)
    }

    pub fn responses_len(&self) -> usize {
        self.responses.len()
    }

    pub fn pending(&self, channel: Channel) -> usize {
        let ch = self.requester(channel);
        ch.queue.len() + ch.in_flight.is_some() as usize
    }

    /// No queued or in-flight work and the channel is back in IDLE.
    pub fn is_drained(&self, channel: Channel) -> bool {
        self.requester(channel).is_drained(&self.core)
    }

    pub fn is_idle(&self, channel: Channel) -> bool {
        self.core.is_idle(channel)
    }

    pub fn state(&self, channel: Channel) -> ChannelState {
        self.core.state(channel)
    }

    fn requester(&self, channel: Channel) -> &RequesterChannel {
        match channel {
            Channel::Write => &self.write,
            Channel::Read => &self.read,
        }
    }

    fn abandon_in_flight(&mut self, why: &str) {
        self.write.abandon(self.core.name(), why);
        self.read.abandon(self.core.name(), why);
    }
}

impl BusParticipant for Master {
    fn core(&self) -> &ParticipantCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ParticipantCore {
        &mut self.core
    }

    fn on_clock_edge(&mut self, ctx: &EdgeContext<'_>, bus: &mut UpBus) -> SimResult<()> {
        if let Some(beat) = self.write.clock_edge(&mut self.core, ctx, &mut bus.write) {
            ctx.notify_beat(self.core.name(), Channel::Write, &beat.transaction);
        }

        if let Some(beat) = self.read.clock_edge(&mut self.core, ctx, &mut bus.read) {
            tracing::trace!("{}: read #{} {}", self.core.name(), beat.seq, beat.transaction);
            ctx.notify_beat(self.core.name(), Channel::Read, &beat.transaction);
            self.responses
                .push_back((ReadTicket(beat.seq), beat.transaction));
        }
        Ok(())
    }

    fn on_reset(&mut self, ctx: &EdgeContext<'_>, bus: &mut UpBus) {
        self.abandon_in_flight("reset");
        for channel in Channel::ALL {
            let lines = bus.channel_mut(channel);
            lines.req.set_immediate(DigitalLevel::Low);
            lines.addr.set_immediate(0);
            if channel == Channel::Write {
                lines.data.set_immediate(0);
            }
            self.core.transition(channel, ChannelState::Idle, ctx);
        }
    }

    fn restart(&mut self, ctx: &EdgeContext<'_>, _bus: &mut UpBus) {
        // Queued beats survive; the beat on the wire does not.
        self.abandon_in_flight("restart");
        self.core.restart(ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
