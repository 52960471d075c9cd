// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Mutex;
use upbus_core::{BusLine, BusObserver, BusWidths, UpBus};
use vcd::{IdCode, TimescaleUnit, Value, Writer};

/// Dumps the reset line and the eight bus lines, one timestamp per clock edge.
pub struct VcdObserver {
    state: Mutex<VcdState>,
    resetn: IdCode,
    lines: Vec<(BusLine, IdCode, u32)>,
}

struct VcdState {
    writer: Writer<BufWriter<File>>,
    last_resetn: bool,
    last: [u32; 8],
}

fn line_width(line: BusLine, widths: BusWidths) -> u32 {
    use upbus_core::signals::LineRole;
    match line.role() {
        LineRole::Request | LineRole::Acknowledge => 1,
        LineRole::Address => widths.address as u32,
        LineRole::Data => widths.data as u32,
    }
}

impl VcdObserver {
    pub fn new(path: std::path::PathBuf, widths: BusWidths) -> anyhow::Result<Self> {
        let file = File::create(path)?;
        let buf = BufWriter::new(file);
        let mut writer = Writer::new(buf);

        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module("upbus")?;
        let resetn = writer.add_wire(1, "resetn")?;
        let mut lines = Vec::with_capacity(BusLine::ALL.len());
        for line in BusLine::ALL {
            let width = line_width(line, widths);
            let id = writer.add_wire(width, line.as_str())?;
            lines.push((line, id, width));
        }
        writer.upscope()?;
        writer.enddefinitions()?;

        writer.timestamp(0)?;
        writer.change_scalar(resetn, Value::V1)?;
        for (_, id, width) in &lines {
            if *width == 1 {
                writer.change_scalar(*id, Value::V0)?;
            } else {
                writer.change_vector(*id, u64_to_vec(0, *width))?;
            }
        }

        Ok(Self {
            state: Mutex::new(VcdState {
                writer,
                last_resetn: true,
                last: [0; 8],
            }),
            resetn,
            lines,
        })
    }
}

// MSB first
fn u64_to_vec(val: u64, width: u32) -> Vec<Value> {
    let mut bits = Vec::with_capacity(width as usize);
    for i in (0..width).rev() {
        let bit = (val >> i) & 1;
        bits.push(level(bit == 1));
    }
    bits
}

fn level(high: bool) -> Value {
    if high {
        Value::V1
    } else {
        Value::V0
    }
}

impl core::fmt::Debug for VcdObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "VcdObserver")
    }
}

impl BusObserver for VcdObserver {
    fn on_edge(&self, cycle: u64, bus: &UpBus, reset_active: bool) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let _ = state.writer.timestamp(cycle);

        let resetn = !reset_active;
        if resetn != state.last_resetn {
            state.last_resetn = resetn;
            let _ = state
                .writer
                .change_scalar(self.resetn, level(resetn));
        }

        for (slot, (line, id, width)) in self.lines.iter().enumerate() {
            let value = bus.line(*line);
            if state.last[slot] == value {
                continue;
            }
            state.last[slot] = value;
            let _ = if *width == 1 {
                state.writer.change_scalar(*id, level(value != 0))
            } else {
                state.writer.change_vector(*id, u64_to_vec(value as u64, *width))
            };
        }
    }
}
