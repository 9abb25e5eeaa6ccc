use crate::{
    config::arch_config::WordType,
    event::Event,
    hart::{
        fault::Fault,
        state::{Executed, HartState, Trap},
        syscall::SyscallBridge,
    },
    isa::{DECODER, Decoder, Opcode, RiscvInstr},
};

/// Why a run ended without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The pc left every mapped region.
    PcOutOfRange(WordType),
    /// `jal` to its own address, the idle loop bare-metal programs end with.
    SelfJump(WordType),
    /// The guest called `exit` or `exit_group`.
    Exited(i32),
    /// `ebreak` at this address with no debugger attached.
    Breakpoint(WordType),
}

/// Fetch, decode, execute for one hart.
pub struct Executor {
    decoder: &'static Decoder,
    syscalls: SyscallBridge,
    pub(crate) before_execute: Event<HartState>,
    pub(crate) after_execute: Event<HartState>,
}

impl Executor {
    pub fn new(syscalls: SyscallBridge) -> Self {
        Self {
            decoder: &DECODER,
            syscalls,
            before_execute: Event::new(),
            after_execute: Event::new(),
        }
    }

    pub fn syscalls_mut(&mut self) -> &mut SyscallBridge {
        &mut self.syscalls
    }

    /// Execute one instruction.
    pub fn step(&mut self, hs: &mut HartState) -> Result<(), Fault> {
        // IF
        let pc = hs.pc.read();
        let word = hs.mem().fetch_u32(pc)?;

        self.before_execute.fire(hs);

        // ID
        let opcode = self.decoder.decode(word);
        if opcode == Opcode::Unknown {
            log::warn!("Illegal instruction: {:#010x} at {:#x}", word, pc);
            return Err(Fault::IllegalInstruction { word, pc });
        }
        let desc = self.decoder.entry(opcode);
        let info = desc.encoding.layout().extract(word);

        log::trace!("{:#x}: {:?} {:?}", pc, desc.instr, info);

        // EX && MEM && WB
        (desc.exec)(info, hs)?;

        match hs.take_trap() {
            Some(Trap::EnvCall) => self.syscalls.emulate(hs)?,
            Some(Trap::Breakpoint) if hs.pauses_on_ebreak() => hs.request_pause(),
            Some(Trap::Breakpoint) => hs.set_unhandled_breakpoint(pc),
            None => {}
        }

        hs.set_last_executed(Executed {
            pc,
            word,
            opcode,
            instr: desc.instr,
        });

        self.after_execute.fire(hs);
        Ok(())
    }

    /// Whether the run should end after the last step.
    pub fn halt_reason(hs: &HartState) -> Option<HaltReason> {
        if let Some(code) = hs.exit_code() {
            return Some(HaltReason::Exited(code));
        }
        if let Some(addr) = hs.unhandled_breakpoint() {
            return Some(HaltReason::Breakpoint(addr));
        }

        let pc = hs.pc.read();
        if let Some(last) = hs.last_executed() {
            if last.instr == RiscvInstr::JAL && last.pc == pc {
                return Some(HaltReason::SelfJump(pc));
            }
        }

        if !hs.mem().contains(pc) {
            return Some(HaltReason::PcOutOfRange(pc));
        }

        None
    }
}
