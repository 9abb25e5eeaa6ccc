//! Human readable execution traces built on the hart's listener channels.

mod stats;

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use bitflags::bitflags;

use crate::{
    config::arch_config::REG_NUMERIC_NAME,
    hart::{Hart, fault::Fault, state::HartState},
    isa::disasm::disassemble,
    utils::lock,
};

pub use stats::Stats;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceMode: u8 {
        const INSTRUCTION = 1 << 0;
        const MEMORY = 1 << 1; // data accesses, not instruction fetch
        const REGISTER = 1 << 2; // register writes
    }
}

impl TraceMode {
    /// Parse a comma separated list such as `instruction,memory`.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .try_fold(TraceMode::empty(), |mode, name| {
                let flag = match name.to_ascii_lowercase().as_str() {
                    "instruction" | "instr" | "i" => TraceMode::INSTRUCTION,
                    "memory" | "mem" | "m" => TraceMode::MEMORY,
                    "register" | "reg" | "r" => TraceMode::REGISTER,
                    "all" => TraceMode::all(),
                    other => return Err(format!("unknown trace mode `{}`", other)),
                };
                Ok(mode | flag)
            })
    }
}

pub type TraceSink = Arc<Mutex<dyn Write + Send>>;

pub struct Tracer;

impl Tracer {
    /// Subscribe trace writers for every mode in `mode`. Must be called before the hart starts.
    pub fn install(hart: &mut Hart, mode: TraceMode, sink: TraceSink) -> Result<(), Fault> {
        if mode.contains(TraceMode::INSTRUCTION) {
            let sink = sink.clone();
            hart.on_before_execute(move |hs: &HartState| {
                let pc = hs.pc.read();
                if let Ok(word) = hs.mem().fetch_u32(pc) {
                    emit(&sink, format_args!("{:#010x}: {:08x}  {}", pc, word, disassemble(word, pc)));
                }
            })?;
        }

        if mode.contains(TraceMode::MEMORY) {
            let read_sink = sink.clone();
            hart.on_memory_read(move |e| {
                emit(
                    &read_sink,
                    format_args!("    mem[{:#x}] -> {:#x} ({}B)", e.addr, e.value, e.width),
                );
            })?;
            let write_sink = sink.clone();
            hart.on_memory_write(move |e| {
                emit(
                    &write_sink,
                    format_args!("    mem[{:#x}] <- {:#x} (was {:#x})", e.addr, e.new, e.old),
                );
            })?;
        }

        if mode.contains(TraceMode::REGISTER) {
            hart.on_register_write(move |e| {
                emit(
                    &sink,
                    format_args!(
                        "    {} <- {:#x} (was {:#x})",
                        REG_NUMERIC_NAME[e.index as usize], e.new, e.old
                    ),
                );
            })?;
        }

        Ok(())
    }
}

fn emit(sink: &TraceSink, line: std::fmt::Arguments) {
    if let Err(err) = writeln!(lock(sink), "{}", line) {
        log::warn!("trace output failed: {}", err);
    }
}
