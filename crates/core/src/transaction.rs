// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;
use std::fmt;

/// One bus beat: an address and, once known, its data word.
///
/// Read requests carry no data until the beat completes. Fields are private so
/// a write can never be built without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transaction {
    address: u32,
    data: Option<u32>,
}

impl Transaction {
    pub fn write(address: u32, data: u32) -> Self {
        Self {
            address,
            data: Some(data),
        }
    }

    pub fn read(address: u32) -> Self {
        Self {
            address,
            data: None,
        }
    }

    /// Fill in the data observed when the beat was acknowledged.
    pub fn complete(self, data: u32) -> Self {
        Self {
            address: self.address,
            data: Some(data),
        }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn data(&self) -> Option<u32> {
        self.data
    }

    pub fn is_complete(&self) -> bool {
        self.data.is_some()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data {
            Some(d) => write!(f, "[{:#x}] = {:#x}", self.address, d),
            None => write!(f, "[{:#x}] = ?", self.address),
        }
    }
}

/// Identifies a read issued to a master, used to collect its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadTicket(pub(crate) u64);
