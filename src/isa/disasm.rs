//! Print actions of the opcode table.

use crate::{
    config::arch_config::{REG_NUMERIC_NAME, WordType},
    isa::{
        bits::sign_extend,
        decoder::{DECODER, Opcode},
        instruction::{RVInstrInfo, RiscvInstr},
    },
};

fn reg(idx: u8) -> &'static str {
    REG_NUMERIC_NAME[idx as usize]
}

/// Default print action: operands in assembler order, branch and jump
/// targets as absolute addresses.
pub fn print_by_format(instr: RiscvInstr, info: RVInstrInfo, pc: WordType) -> String {
    let name = instr.mnemonic();
    match info {
        RVInstrInfo::None => name,
        RVInstrInfo::R { rs1, rs2, rd } => {
            format!("{name} {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
        }
        RVInstrInfo::I { rs1, rd, imm } => {
            let imm = sign_extend::<12>(imm) as i64;
            format!("{name} {}, {}, {imm}", reg(rd), reg(rs1))
        }
        RVInstrInfo::S { rs1, rs2, imm } => {
            let imm = sign_extend::<12>(imm) as i64;
            format!("{name} {}, {imm}({})", reg(rs2), reg(rs1))
        }
        RVInstrInfo::B { rs1, rs2, imm } => {
            let target = pc.wrapping_add(sign_extend::<13>(imm));
            format!("{name} {}, {}, {target:#x}", reg(rs1), reg(rs2))
        }
        RVInstrInfo::U { rd, imm } => format!("{name} {}, {:#x}", reg(rd), imm >> 12),
        RVInstrInfo::J { rd, imm } => {
            let target = pc.wrapping_add(sign_extend::<21>(imm));
            format!("{name} {}, {target:#x}", reg(rd))
        }
    }
}

/// `rd, offset(rs1)`: loads and `jalr`.
pub fn print_load(instr: RiscvInstr, info: RVInstrInfo, pc: WordType) -> String {
    match info {
        RVInstrInfo::I { rs1, rd, imm } => {
            let imm = sign_extend::<12>(imm) as i64;
            format!("{} {}, {imm}({})", instr.mnemonic(), reg(rd), reg(rs1))
        }
        _ => print_by_format(instr, info, pc),
    }
}

pub fn print_store(instr: RiscvInstr, info: RVInstrInfo, pc: WordType) -> String {
    print_by_format(instr, info, pc)
}

/// Shift-immediate forms print the shift amount, not the raw immediate field.
pub fn print_shift_imm(instr: RiscvInstr, info: RVInstrInfo, pc: WordType) -> String {
    let name = instr.mnemonic();
    match info {
        RVInstrInfo::I { rs1, rd, imm } => {
            format!("{name} {}, {}, {}", reg(rd), reg(rs1), imm & 0x3F)
        }
        RVInstrInfo::R { rs1, rs2, rd } => format!("{name} {}, {}, {rs2}", reg(rd), reg(rs1)),
        _ => print_by_format(instr, info, pc),
    }
}

pub fn print_fence(instr: RiscvInstr, _info: RVInstrInfo, _pc: WordType) -> String {
    instr.mnemonic()
}

pub fn print_none(instr: RiscvInstr, _info: RVInstrInfo, _pc: WordType) -> String {
    instr.mnemonic()
}

/// Render `word` as if fetched at `pc`.
pub fn disassemble(word: u32, pc: WordType) -> String {
    match DECODER.decode(word) {
        Opcode::Unknown => format!("unknown [{word:#010x}]"),
        opcode => {
            let desc = DECODER.entry(opcode);
            (desc.print)(desc.instr, desc.encoding.layout().extract(word), pc)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble() {
        assert_eq!(disassemble(0x00500293, 0x1000), "addi x5, x0, 5");
        assert_eq!(disassemble(0x402081b3, 0x1000), "sub x3, x1, x2");
        assert_eq!(disassemble(0x00812183, 0x1000), "lw x3, 8(x2)");
        assert_eq!(disassemble(0x0020b423, 0x1000), "sd x2, 8(x1)");
        assert_eq!(disassemble(0x00000463, 0x2000), "beq x0, x0, 0x2008");
        assert_eq!(disassemble(0x0000006f, 0x1000), "jal x0, 0x1000");
        assert_eq!(disassemble(0x123451b7, 0x1000), "lui x3, 0x12345");
        assert_eq!(disassemble(0x4032d293, 0x1000), "srai x5, x5, 3");
        assert_eq!(disassemble(0x4027d79b, 0x1000), "sraiw x15, x15, 2");
        assert_eq!(disassemble(0x00000073, 0x1000), "ecall");
        assert_eq!(disassemble(0x0000100f, 0x1000), "fence.i");
        assert_eq!(disassemble(0xffb18113, 0x1000), "addi x2, x3, -5");
        assert_eq!(disassemble(0xFFFF_FFFF, 0x1000), "unknown [0xffffffff]");
    }

    #[test]
    fn test_backward_branch() {
        // bne x6, x12, -112
        assert_eq!(disassemble(0xf8c318e3, 0x1000), "bne x6, x12, 0xf90");
    }
}
