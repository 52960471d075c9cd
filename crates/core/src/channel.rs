// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::EdgeContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One direction of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Write,
    Read,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Write, Channel::Read];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Write => "write",
            Channel::Read => "read",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handshake state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    #[default]
    Idle,
    /// Request asserted, first acknowledge not yet seen.
    Request,
    /// Acknowledge seen and the next queued beat is on the wire.
    Acknowledged,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelState::Idle => "IDLE",
            ChannelState::Request => "REQUEST",
            ChannelState::Acknowledged => "ACKNOWLEDGED",
        })
    }
}

/// One-shot "channel quiescent" notification.
#[derive(Debug, Clone, Default)]
pub struct IdleFlag {
    set: bool,
}

impl IdleFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self) {
        self.set = true;
    }

    pub fn clear(&mut self) {
        self.set = false;
    }

    pub fn is_set(&self) -> bool {
        self.set
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelCore {
    state: ChannelState,
    idle: IdleFlag,
}

impl ChannelCore {
    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn idle(&self) -> &IdleFlag {
        &self.idle
    }
}

/// The part every participant shares: a name, both channel states and their
/// idle notifications, and the restart generation.
#[derive(Debug, Clone)]
pub struct ParticipantCore {
    name: String,
    write: ChannelCore,
    read: ChannelCore,
    generation: u64,
}

impl ParticipantCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            write: ChannelCore::default(),
            read: ChannelCore::default(),
            generation: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self, channel: Channel) -> &ChannelCore {
        match channel {
            Channel::Write => &self.write,
            Channel::Read => &self.read,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelCore {
        match channel {
            Channel::Write => &mut self.write,
            Channel::Read => &mut self.read,
        }
    }

    pub fn state(&self, channel: Channel) -> ChannelState {
        self.channel(channel).state
    }

    /// True whenever either channel is outside IDLE.
    pub fn is_active(&self) -> bool {
        self.write.state != ChannelState::Idle || self.read.state != ChannelState::Idle
    }

    /// Number of restarts so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mark_idle(&mut self, channel: Channel) {
        self.channel_mut(channel).idle.set();
    }

    pub fn clear_idle(&mut self, channel: Channel) {
        self.channel_mut(channel).idle.clear();
    }

    pub fn is_idle(&self, channel: Channel) -> bool {
        self.channel(channel).idle.is_set()
    }

    pub fn transition(&mut self, channel: Channel, to: ChannelState, ctx: &EdgeContext<'_>) {
        let from = self.channel(channel).state;
        if from == to {
            return;
        }
        tracing::debug!("{} STATE: {} : BUS {}", self.name, to, channel);
        for observer in ctx.observers {
            observer.on_state_change(&self.name, channel, from, to);
        }
        self.channel_mut(channel).state = to;
    }

    /// Drop both channel tasks back to a clean IDLE and clear their idle
    /// notifications. Whatever the old tasks held in flight is gone.
    pub fn restart(&mut self, ctx: &EdgeContext<'_>) {
        for channel in Channel::ALL {
            self.transition(channel, ChannelState::Idle, ctx);
            self.clear_idle(channel);
        }
        self.generation += 1;
        tracing::debug!("{} restarted (generation {})", self.name, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_flag() {
        let mut idle = IdleFlag::new();
        assert!(!idle.is_set());
        idle.set();
        assert!(idle.is_set());
        idle.clear();
        assert!(!idle.is_set());
    }

    #[test]
    fn test_active_follows_either_channel() {
        let ctx = EdgeContext::detached(0);
        let mut core = ParticipantCore::new("p");
        assert!(!core.is_active());

        core.transition(Channel::Read, ChannelState::Request, &ctx);
        assert!(core.is_active());
        core.transition(Channel::Read, ChannelState::Idle, &ctx);
        core.transition(Channel::Write, ChannelState::Acknowledged, &ctx);
        assert!(core.is_active());
    }

    #[test]
    fn test_restart_clears_idle_and_state() {
        let ctx = EdgeContext::detached(0);
        let mut core = ParticipantCore::new("p");
        core.transition(Channel::Write, ChannelState::Request, &ctx);
        core.mark_idle(Channel::Read);

        core.restart(&ctx);
        assert_eq!(core.state(Channel::Write), ChannelState::Idle);
        assert!(!core.is_idle(Channel::Read));
        assert!(!core.is_active());
        assert_eq!(core.generation(), 1);
    }
}
