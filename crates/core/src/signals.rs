// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::channel::Channel;
use std::fmt;
use std::str::FromStr;
use upbus_config::SignalName;

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl DigitalLevel {
    pub fn is_high(self) -> bool {
        self == DigitalLevel::High
    }
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

/// A registered signal.
///
/// Values driven during a clock edge are held as pending and only become
/// visible after [`Signal::commit`], so every participant evaluating the same
/// edge samples the same pre-edge value. `set_immediate` bypasses the register
/// and is reserved for edge-reactive logic and fault injection.
#[derive(Debug, Clone, Default)]
pub struct Signal<T> {
    value: T,
    pending: Option<T>,
}

impl<T: Copy + PartialEq> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            pending: None,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    /// Schedule `value` for the next commit. The last drive before a commit wins.
    pub fn drive(&mut self, value: T) {
        self.pending = Some(value);
    }

    pub fn pending(&self) -> Option<T> {
        self.pending
    }

    pub fn set_immediate(&mut self, value: T) {
        self.value = value;
    }

    /// Apply the pending drive. Returns true if the visible value changed.
    pub fn commit(&mut self) -> bool {
        match self.pending.take() {
            Some(v) if v != self.value => {
                self.value = v;
                true
            }
            _ => false,
        }
    }
}

/// Values of one channel's lines as seen at a clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSample {
    pub req: bool,
    pub ack: bool,
    pub addr: u32,
    pub data: u32,
}

/// Request, acknowledge, address and data lines of one channel.
///
/// On the write channel the master drives `data`; on the read channel the
/// slave does.
#[derive(Debug, Clone, Default)]
pub struct ChannelSignals {
    pub req: Signal<DigitalLevel>,
    pub ack: Signal<DigitalLevel>,
    pub addr: Signal<u32>,
    pub data: Signal<u32>,
    presented: bool,
}

impl ChannelSignals {
    /// Mark the pending drives as a fresh beat. It counts as a request bundle
    /// change even when the lines repeat the previous beat.
    pub fn present(&mut self) {
        self.presented = true;
    }

    pub fn sample(&self) -> ChannelSample {
        ChannelSample {
            req: self.req.get().is_high(),
            ack: self.ack.get().is_high(),
            addr: self.addr.get(),
            data: self.data.get(),
        }
    }

    /// Commit all four lines. Returns true if the request bundle changed:
    /// request and address, plus data on the write channel.
    fn commit(&mut self, channel: Channel) -> bool {
        let req = self.req.commit();
        let addr = self.addr.commit();
        let data = self.data.commit();
        self.ack.commit();
        let presented = std::mem::take(&mut self.presented);
        presented || req || addr || (channel == Channel::Write && data)
    }
}

/// The eight uP bus lines.
#[derive(Debug, Clone, Default)]
pub struct UpBus {
    pub write: ChannelSignals,
    pub read: ChannelSignals,
}

/// Channels whose request bundle changed during a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestChanges {
    pub write: bool,
    pub read: bool,
}

impl RequestChanges {
    pub fn channels(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |ch| match ch {
            Channel::Write => self.write,
            Channel::Read => self.read,
        })
    }
}

impl UpBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self, channel: Channel) -> &ChannelSignals {
        match channel {
            Channel::Write => &self.write,
            Channel::Read => &self.read,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelSignals {
        match channel {
            Channel::Write => &mut self.write,
            Channel::Read => &mut self.read,
        }
    }

    pub fn commit(&mut self) -> RequestChanges {
        RequestChanges {
            write: self.write.commit(Channel::Write),
            read: self.read.commit(Channel::Read),
        }
    }

    pub fn line(&self, line: BusLine) -> u32 {
        let ch = self.channel(line.channel());
        match line.role() {
            LineRole::Request => ch.req.get().is_high() as u32,
            LineRole::Acknowledge => ch.ack.get().is_high() as u32,
            LineRole::Address => ch.addr.get(),
            LineRole::Data => ch.data.get(),
        }
    }

    /// Set a line immediately, bypassing the clock. Single-bit lines treat any
    /// non-zero value as high.
    pub fn force(&mut self, line: BusLine, value: u32) {
        let ch = self.channel_mut(line.channel());
        match line.role() {
            LineRole::Request => ch.req.set_immediate((value != 0).into()),
            LineRole::Acknowledge => ch.ack.set_immediate((value != 0).into()),
            LineRole::Address => ch.addr.set_immediate(value),
            LineRole::Data => ch.data.set_immediate(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Request,
    Acknowledge,
    Address,
    Data,
}

/// Names one of the eight bus lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusLine {
    WriteRequest,
    WriteAcknowledge,
    WriteAddress,
    WriteData,
    ReadRequest,
    ReadAcknowledge,
    ReadAddress,
    ReadData,
}

impl BusLine {
    pub const ALL: [BusLine; 8] = [
        BusLine::WriteRequest,
        BusLine::WriteAcknowledge,
        BusLine::WriteAddress,
        BusLine::WriteData,
        BusLine::ReadRequest,
        BusLine::ReadAcknowledge,
        BusLine::ReadAddress,
        BusLine::ReadData,
    ];

    pub fn channel(self) -> Channel {
        match self {
            BusLine::WriteRequest
            | BusLine::WriteAcknowledge
            | BusLine::WriteAddress
            | BusLine::WriteData => Channel::Write,
            _ => Channel::Read,
        }
    }

    pub fn role(self) -> LineRole {
        match self {
            BusLine::WriteRequest | BusLine::ReadRequest => LineRole::Request,
            BusLine::WriteAcknowledge | BusLine::ReadAcknowledge => LineRole::Acknowledge,
            BusLine::WriteAddress | BusLine::ReadAddress => LineRole::Address,
            BusLine::WriteData | BusLine::ReadData => LineRole::Data,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BusLine::WriteRequest => "wreq",
            BusLine::WriteAcknowledge => "wack",
            BusLine::WriteAddress => "waddr",
            BusLine::WriteData => "wdata",
            BusLine::ReadRequest => "rreq",
            BusLine::ReadAcknowledge => "rack",
            BusLine::ReadAddress => "raddr",
            BusLine::ReadData => "rdata",
        }
    }
}

impl fmt::Display for BusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusLine {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase();
        BusLine::ALL
            .into_iter()
            .find(|line| line.as_str() == v)
            .ok_or_else(|| {
                format!(
                    "unknown bus line '{}'; supported: wreq, wack, waddr, wdata, rreq, rack, raddr, rdata",
                    value
                )
            })
    }
}

impl From<SignalName> for BusLine {
    fn from(name: SignalName) -> Self {
        match name {
            SignalName::Wreq => BusLine::WriteRequest,
            SignalName::Wack => BusLine::WriteAcknowledge,
            SignalName::Waddr => BusLine::WriteAddress,
            SignalName::Wdata => BusLine::WriteData,
            SignalName::Rreq => BusLine::ReadRequest,
            SignalName::Rack => BusLine::ReadAcknowledge,
            SignalName::Raddr => BusLine::ReadAddress,
            SignalName::Rdata => BusLine::ReadData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_level() {
        assert_eq!(DigitalLevel::default(), DigitalLevel::Low);
        let b: bool = DigitalLevel::from(true).into();
        assert!(b);
    }

    #[test]
    fn test_drive_is_invisible_until_commit() {
        let mut sig = Signal::new(0u32);
        sig.drive(5);
        assert_eq!(sig.get(), 0);
        assert_eq!(sig.pending(), Some(5));
        assert!(sig.commit());
        assert_eq!(sig.get(), 5);
        assert!(sig.pending().is_none());

        // Same value again is not a change.
        sig.drive(5);
        assert!(!sig.commit());
    }

    #[test]
    fn test_request_bundle_changes() {
        let mut bus = UpBus::new();
        bus.write.req.drive(DigitalLevel::High);
        bus.read.data.drive(7);
        let changes = bus.commit();
        assert!(changes.write);
        // Read data is slave-driven and not part of the read request bundle.
        assert!(!changes.read);
        assert_eq!(changes.channels().collect::<Vec<_>>(), vec![Channel::Write]);

        bus.read.addr.drive(3);
        let changes = bus.commit();
        assert_eq!(changes.channels().collect::<Vec<_>>(), vec![Channel::Read]);
    }

    #[test]
    fn test_repeated_beat_still_counts_as_change() {
        let mut bus = UpBus::new();
        bus.write.req.set_immediate(DigitalLevel::High);
        bus.write.present();
        bus.write.req.drive(DigitalLevel::High);
        assert!(bus.commit().write);
        assert!(!bus.commit().write);
    }

    #[test]
    fn test_force_and_line_names() {
        let mut bus = UpBus::new();
        bus.force(BusLine::ReadAcknowledge, 1);
        bus.force(BusLine::WriteData, 0xAB);
        assert_eq!(bus.line(BusLine::ReadAcknowledge), 1);
        assert_eq!(bus.line(BusLine::WriteData), 0xAB);
        assert!(bus.read.ack.get().is_high());

        assert_eq!("WACK".parse::<BusLine>(), Ok(BusLine::WriteAcknowledge));
        assert!("foo".parse::<BusLine>().is_err());
        assert_eq!(BusLine::from(SignalName::Raddr), BusLine::ReadAddress);
    }
}
