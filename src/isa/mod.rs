pub mod bits;
pub mod decoder;
pub mod disasm;
pub mod instruction;

mod utils;

pub use decoder::{DECODER, DecodeInstr, Decoder, Opcode};
pub use instruction::{RVInstrDesc, RVInstrInfo, RiscvInstr};
