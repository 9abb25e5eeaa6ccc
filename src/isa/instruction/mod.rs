pub(crate) mod exec_function;
pub mod instr_table;

use crate::{
    config::arch_config::WordType,
    hart::{fault::Fault, state::HartState},
    isa::bits,
};

pub use instr_table::RiscvInstr;

/// A helper function for normal instruction execution.
///
/// It takes a closure `f` that performs the actual instruction logic.
/// If `f` executes successfully, it will increase PC by 4.
#[inline(always)]
pub(crate) fn normal_exec<F>(hs: &mut HartState, f: F) -> Result<(), Fault>
where
    F: FnOnce(&mut HartState) -> Result<(), Fault>,
{
    f(hs)?;
    let next = hs.pc.read().wrapping_add(4);
    hs.pc.write(next);
    Ok(())
}

/// Semantic action of an instruction.
pub type ExecFn = fn(RVInstrInfo, &mut HartState) -> Result<(), Fault>;

/// Print action of an instruction: renders assembly for the operands at `pc`.
pub type PrintFn = fn(RiscvInstr, RVInstrInfo, WordType) -> String;

/// `imm` value is not sign extended, and is shifted:
///
/// Type B: 1
/// Type U: 12
/// Type J: 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RVInstrInfo {
    None,
    R { rs1: u8, rs2: u8, rd: u8 },
    I { rs1: u8, rd: u8, imm: WordType },
    S { rs1: u8, rs2: u8, imm: WordType },
    B { rs1: u8, rs2: u8, imm: WordType },
    U { rd: u8, imm: WordType },
    J { rd: u8, imm: WordType },
}

/// Operand layout of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrFormat {
    None,
    R,
    I,
    S,
    B,
    U,
    J,
}

impl InstrFormat {
    pub fn extract(self, word: u32) -> RVInstrInfo {
        let rd = bits::rd(word);
        let rs1 = bits::rs1(word);
        let rs2 = bits::rs2(word);

        match self {
            InstrFormat::None => RVInstrInfo::None,
            InstrFormat::R => RVInstrInfo::R { rs1, rs2, rd },
            InstrFormat::I => RVInstrInfo::I {
                rs1,
                rd,
                imm: bits::i_imm(word) as WordType,
            },
            InstrFormat::S => RVInstrInfo::S {
                rs1,
                rs2,
                imm: bits::s_imm(word) as WordType,
            },
            InstrFormat::B => RVInstrInfo::B {
                rs1,
                rs2,
                imm: bits::b_imm(word) as WordType,
            },
            InstrFormat::U => RVInstrInfo::U {
                rd,
                imm: bits::u_imm(word) as WordType,
            },
            InstrFormat::J => RVInstrInfo::J {
                rd,
                imm: bits::j_imm(word) as WordType,
            },
        }
    }
}

/// How a table entry recognises its words. Each fixed-field variant is the
/// format tag of the entry and names the fields that must match; `Custom`
/// entries carry their own predicate and the operand layout to extract.
#[derive(Debug, Clone, Copy)]
pub enum Encoding {
    R { opcode: u8, funct3: u8, funct7: u8 },
    I { opcode: u8, funct3: u8 },
    S { opcode: u8, funct3: u8 },
    B { opcode: u8, funct3: u8 },
    U { opcode: u8 },
    J { opcode: u8 },
    Custom { layout: InstrFormat, matches: fn(u32) -> bool },
}

impl Encoding {
    #[inline]
    pub fn matches(&self, word: u32) -> bool {
        match *self {
            Encoding::R {
                opcode,
                funct3,
                funct7,
            } => {
                bits::opcode(word) == opcode
                    && bits::funct3(word) == funct3
                    && bits::funct7(word) == funct7
            }
            Encoding::I { opcode, funct3 }
            | Encoding::S { opcode, funct3 }
            | Encoding::B { opcode, funct3 } => {
                bits::opcode(word) == opcode && bits::funct3(word) == funct3
            }
            Encoding::U { opcode } | Encoding::J { opcode } => bits::opcode(word) == opcode,
            Encoding::Custom { matches, .. } => matches(word),
        }
    }

    pub fn layout(&self) -> InstrFormat {
        match self {
            Encoding::R { .. } => InstrFormat::R,
            Encoding::I { .. } => InstrFormat::I,
            Encoding::S { .. } => InstrFormat::S,
            Encoding::B { .. } => InstrFormat::B,
            Encoding::U { .. } => InstrFormat::U,
            Encoding::J { .. } => InstrFormat::J,
            Encoding::Custom { layout, .. } => *layout,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Encoding::Custom { .. })
    }
}

/// One opcode table entry. Among all entries matching a word, the one with
/// the smallest `precedence` wins.
#[derive(Debug, Clone, Copy)]
pub struct RVInstrDesc {
    pub instr: RiscvInstr,
    pub encoding: Encoding,
    pub precedence: u32,
    pub exec: ExecFn,
    pub print: PrintFn,
}

impl RVInstrDesc {
    /// Bare mnemonic, e.g. `addi`.
    pub fn name(&self) -> String {
        self.instr.mnemonic()
    }

    /// Extension prefix, e.g. `rv32i`.
    pub fn prefix(&self) -> &'static str {
        self.instr.isa_name()
    }

    /// Prefixed name, e.g. `rv32i_addi`.
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.prefix(), self.name())
    }
}

// define a single enum for every instruction
// define tables for each instruction set
#[macro_export]
macro_rules! define_riscv_isa {
    (@print) => {
        $crate::isa::disasm::print_by_format
    };
    (@print $print:expr) => {
        $print
    };
    ( $tot_instr_name:ident,
        $( $isa_name:ident, $isa_table_name:ident, {$(
                $name:ident {
                    encoding: $encoding:expr,
                    precedence: $precedence:literal,
                    exec: $exec:expr,
                    $(print: $print:expr,)?
                }),* $(,)?
            }
        ),* $(,)?
    ) => {

        $crate::define_instr_enum!($tot_instr_name, $($($name,)*)*);

        impl $tot_instr_name {
            pub fn isa_name(&self) -> &'static str {
                match self {
                    $(
                        $(
                            $tot_instr_name::$name => stringify!($isa_name),
                        )*
                    )*
                }
            }
        }

        $(
            pub const $isa_table_name: &[RVInstrDesc] = &[
                $(
                    RVInstrDesc {
                        instr: $tot_instr_name::$name,
                        encoding: $encoding,
                        precedence: $precedence,
                        exec: $exec,
                        print: $crate::define_riscv_isa!(@print $($print)?),
                    }
                ),*
            ];
        )*
    };
}
