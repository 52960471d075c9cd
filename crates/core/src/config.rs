// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::BusLine;
use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};
use upbus_config::{BenchConfig, MAX_BUS_WIDTH};

/// Address and data line widths in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusWidths {
    pub address: u8,
    pub data: u8,
}

impl Default for BusWidths {
    fn default() -> Self {
        Self {
            address: MAX_BUS_WIDTH,
            data: MAX_BUS_WIDTH,
        }
    }
}

impl BusWidths {
    fn fits(value: u32, bits: u8) -> bool {
        bits >= 32 || value >> bits == 0
    }

    pub fn check(&self, line: BusLine, value: u32) -> SimResult<()> {
        use crate::signals::LineRole;
        let bits = match line.role() {
            LineRole::Request | LineRole::Acknowledge => 1,
            LineRole::Address => self.address,
            LineRole::Data => self.data,
        };
        if Self::fits(value, bits) {
            Ok(())
        } else {
            Err(SimulationError::ValueTooWide { value, bits, line })
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub widths: BusWidths,
    /// Clock edges a blocking wait may take before giving up. `None` waits forever.
    pub watchdog_cycles: Option<u64>,
}

impl From<&BenchConfig> for SimulationConfig {
    fn from(bench: &BenchConfig) -> Self {
        Self {
            widths: BusWidths {
                address: bench.address_width,
                data: bench.data_width,
            },
            watchdog_cycles: bench.watchdog_cycles,
        }
    }
}
