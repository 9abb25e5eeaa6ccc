use std::collections::HashMap;

use crate::{
    config::arch_config::WordType,
    cpu::RegFile,
    hart::{executor::HaltReason, fault::Fault},
    isa::{Opcode, RiscvInstr},
    mem::MemoryImage,
};

/// Keys of the named addresses maintained by process bootstrap and the syscall layer.
pub mod names {
    pub const ENTRY: &str = "entry";
    pub const HEAP_START: &str = "heap_start";
    pub const HEAP_END: &str = "heap_end";
    pub const STACK_START: &str = "stack_start";
    pub const STACK_END: &str = "stack_end";
    pub const MMAP_NEXT: &str = "mmap_next";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter {
    current: WordType,
    previous: WordType,
}

impl ProgramCounter {
    pub fn new(value: WordType) -> Self {
        Self {
            current: value,
            previous: value,
        }
    }

    #[inline]
    pub fn read(&self) -> WordType {
        self.current
    }

    /// Move to `value`; the old value becomes [`Self::previous`].
    #[inline]
    pub fn write(&mut self, value: WordType) {
        self.previous = self.current;
        self.current = value;
    }

    pub fn previous(&self) -> WordType {
        self.previous
    }

    /// Jump without recording history.
    pub fn reset(&mut self, value: WordType) {
        *self = Self::new(value);
    }
}

/// Raised by an instruction and serviced by the engine at the end of the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    EnvCall,
    Breakpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executed {
    pub pc: WordType,
    pub word: u32,
    pub opcode: Opcode,
    pub instr: RiscvInstr,
}

/// Everything one instruction can observe or modify.
#[derive(Debug)]
pub struct HartState {
    rf: RegFile,
    mem: MemoryImage,
    pub pc: ProgramCounter,
    named: HashMap<String, WordType>,

    pending_trap: Option<Trap>,
    /// Set while a debugger is attached; otherwise `ebreak` ends the run.
    pause_on_ebreak: bool,
    pause_requested: bool,
    unhandled_breakpoint: Option<WordType>,
    last_executed: Option<Executed>,
    exit_code: Option<i32>,
    halt_reason: Option<HaltReason>,
    fault: Option<Fault>,
}

impl HartState {
    pub fn new(mem: MemoryImage, entry: WordType) -> Self {
        let mut named = HashMap::new();
        named.insert(names::ENTRY.to_string(), entry);

        Self {
            rf: RegFile::new(),
            mem,
            pc: ProgramCounter::new(entry),
            named,
            pending_trap: None,
            pause_on_ebreak: false,
            pause_requested: false,
            unhandled_breakpoint: None,
            last_executed: None,
            exit_code: None,
            halt_reason: None,
            fault: None,
        }
    }

    pub fn rf(&self) -> &RegFile {
        &self.rf
    }

    pub fn rf_mut(&mut self) -> &mut RegFile {
        &mut self.rf
    }

    pub fn mem(&self) -> &MemoryImage {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut MemoryImage {
        &mut self.mem
    }

    #[inline]
    pub fn read_gpr(&mut self, idx: u8) -> WordType {
        self.rf.read(idx)
    }

    #[inline]
    pub fn write_gpr(&mut self, idx: u8, value: WordType) {
        self.rf.write(idx, value)
    }

    pub fn named_address(&self, name: &str) -> Option<WordType> {
        self.named.get(name).copied()
    }

    pub fn set_named_address(&mut self, name: &str, addr: WordType) {
        self.named.insert(name.to_string(), addr);
    }

    pub fn named_addresses(&self) -> impl Iterator<Item = (&str, WordType)> {
        self.named.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub(crate) fn raise(&mut self, trap: Trap) {
        self.pending_trap = Some(trap);
    }

    pub(crate) fn take_trap(&mut self) -> Option<Trap> {
        self.pending_trap.take()
    }

    /// Ask the execution thread to pause after the current step.
    pub fn request_pause(&mut self) {
        self.pause_requested = true;
    }

    pub(crate) fn take_pause_request(&mut self) -> bool {
        std::mem::take(&mut self.pause_requested)
    }

    pub fn pauses_on_ebreak(&self) -> bool {
        self.pause_on_ebreak
    }

    pub(crate) fn set_pause_on_ebreak(&mut self, enabled: bool) {
        self.pause_on_ebreak = enabled;
    }

    /// Address of an `ebreak` executed with nobody to service it.
    pub fn unhandled_breakpoint(&self) -> Option<WordType> {
        self.unhandled_breakpoint
    }

    pub(crate) fn set_unhandled_breakpoint(&mut self, pc: WordType) {
        self.unhandled_breakpoint = Some(pc);
    }

    pub fn last_executed(&self) -> Option<&Executed> {
        self.last_executed.as_ref()
    }

    pub(crate) fn set_last_executed(&mut self, executed: Executed) {
        self.last_executed = Some(executed);
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub(crate) fn set_exit_code(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    pub(crate) fn set_halt_reason(&mut self, reason: HaltReason) {
        self.halt_reason = Some(reason);
    }

    /// The fault that ended the run, if any.
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub(crate) fn set_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }
}
