// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod channel;
pub mod config;
pub mod master;
pub mod metrics;
pub mod monitor;
pub mod signals;
pub mod simulator;
pub mod slave;
pub mod testbench;
pub mod transaction;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use channel::{Channel, ChannelState, ParticipantCore};
pub use config::{BusWidths, SimulationConfig};
pub use master::Master;
pub use metrics::BusMetrics;
pub use monitor::Monitor;
pub use signals::{BusLine, DigitalLevel, UpBus};
pub use simulator::{ParticipantId, Simulator};
pub use slave::{EchoSlave, RegisterFile};
pub use testbench::Testbench;
pub use transaction::{ReadTicket, Transaction};

/// Wire-level invariant a monitor can see broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    AckWithoutRequest,
    RequestDuringReset,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Violation::AckWithoutRequest => "acknowledge asserted while request is low",
            Violation::RequestDuringReset => "request asserted during reset",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Protocol violation on {channel} channel at cycle {cycle}: {violation}")]
    ProtocolViolation {
        channel: Channel,
        cycle: u64,
        violation: Violation,
    },
    #[error("Register address {address:#x} out of range (register file holds {numreg} entries)")]
    AddressOutOfRange { address: u32, numreg: usize },
    #[error("Address and data vectors differ in length ({addresses} vs {data})")]
    LengthMismatch { addresses: usize, data: usize },
    #[error("Value {value:#x} does not fit the {bits}-bit {line} line")]
    ValueTooWide { value: u32, bits: u8, line: BusLine },
    #[error("No response collected for read of {address:#x}")]
    MissingResponse { address: u32 },
    #[error("Watchdog expired after {cycles} cycles")]
    WatchdogExpired { cycles: u64 },
    #[error("Simulation halted by an earlier error: {0}")]
    Halted(Box<SimulationError>),
    #[error("No participant {0}")]
    UnknownParticipant(ParticipantId),
}

impl SimulationError {
    /// Errors that stop the simulator for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimulationError::ProtocolViolation { .. }
                | SimulationError::AddressOutOfRange { .. }
                | SimulationError::Halted(_)
        )
    }
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing bus activity. Every hook is optional.
pub trait BusObserver: fmt::Debug + Send + Sync {
    /// Called once per clock edge after all drives have settled.
    fn on_edge(&self, _cycle: u64, _bus: &UpBus, _reset_active: bool) {}
    fn on_state_change(
        &self,
        _participant: &str,
        _channel: Channel,
        _from: ChannelState,
        _to: ChannelState,
    ) {
    }
    /// A participant completed, served or observed one beat.
    fn on_beat(&self, _participant: &str, _channel: Channel, _transaction: &Transaction) {}
    fn on_violation(&self, _error: &SimulationError) {}
}

/// What a participant sees of the clock edge it is evaluating.
pub struct EdgeContext<'a> {
    pub cycle: u64,
    pub reset_active: bool,
    pub observers: &'a [Arc<dyn BusObserver>],
}

impl EdgeContext<'static> {
    /// A context with no observers and reset released.
    pub fn detached(cycle: u64) -> Self {
        Self {
            cycle,
            reset_active: false,
            observers: &[],
        }
    }
}

impl EdgeContext<'_> {
    pub fn notify_beat(&self, participant: &str, channel: Channel, transaction: &Transaction) {
        for observer in self.observers {
            observer.on_beat(participant, channel, transaction);
        }
    }
}

/// A master, slave or monitor attached to the bus.
///
/// The simulator calls `on_clock_edge` on every participant for each rising
/// edge. Lines read through the bus hold their pre-edge values; drives become
/// visible only after all participants have run.
pub trait BusParticipant: Send {
    fn core(&self) -> &ParticipantCore;

    fn core_mut(&mut self) -> &mut ParticipantCore;

    fn on_clock_edge(&mut self, ctx: &EdgeContext<'_>, bus: &mut UpBus) -> SimResult<()>;

    /// The request bundle of `channel` changed in the edge just committed.
    fn on_request_change(&mut self, _channel: Channel, _bus: &mut UpBus) {}

    /// Reset was just asserted.
    fn on_reset(&mut self, _ctx: &EdgeContext<'_>, _bus: &mut UpBus) {}

    /// Cancel both channel tasks and relaunch them from IDLE.
    fn restart(&mut self, ctx: &EdgeContext<'_>, _bus: &mut UpBus) {
        self.core_mut().restart(ctx);
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn is_active(&self) -> bool {
        self.core().is_active()
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
