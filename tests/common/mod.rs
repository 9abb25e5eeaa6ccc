//! A small RV64 assembler and ELF writer for building guest programs in tests.
#![allow(dead_code)]

use hartsim::isa::bits::*;

pub const ZERO: u8 = 0;
pub const SP: u8 = 2;
pub const T0: u8 = 5;
pub const T1: u8 = 6;
pub const A0: u8 = 10;
pub const A1: u8 = 11;
pub const A2: u8 = 12;
pub const A7: u8 = 17;

pub const SYS_WRITE: i32 = 64;
pub const SYS_EXIT: i32 = 93;

const OP_IMM: u8 = 0b0010011;
const OP: u8 = 0b0110011;
const LUI: u8 = 0b0110111;
const JAL: u8 = 0b1101111;
const BRANCH: u8 = 0b1100011;
const LOAD: u8 = 0b0000011;
const STORE: u8 = 0b0100011;
const SYSTEM: u8 = 0b1110011;

fn i_type(opcode: u8, funct3: u8, rd: u8, rs1: u8, imm: i32) -> u32 {
    let word = set_opcode(0, opcode);
    let word = set_funct3(word, funct3);
    let word = set_rd(word, rd);
    let word = set_rs1(word, rs1);
    set_i_imm(word, imm as u32)
}

pub fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0b000, rd, rs1, imm)
}

pub fn li(rd: u8, imm: i32) -> u32 {
    addi(rd, ZERO, imm)
}

pub fn add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    let word = set_opcode(0, OP);
    let word = set_rd(word, rd);
    let word = set_rs1(word, rs1);
    set_rs2(word, rs2)
}

pub fn lui(rd: u8, imm: u32) -> u32 {
    set_u_imm(set_rd(set_opcode(0, LUI), rd), imm)
}

pub fn jal(rd: u8, offset: i32) -> u32 {
    set_j_imm(set_rd(set_opcode(0, JAL), rd), offset as u32)
}

pub fn beq(rs1: u8, rs2: u8, offset: i32) -> u32 {
    let word = set_opcode(0, BRANCH);
    let word = set_rs1(word, rs1);
    let word = set_rs2(word, rs2);
    set_b_imm(word, offset as u32)
}

pub fn ld(rd: u8, rs1: u8, offset: i32) -> u32 {
    i_type(LOAD, 0b011, rd, rs1, offset)
}

pub fn sd(rs2: u8, rs1: u8, offset: i32) -> u32 {
    let word = set_opcode(0, STORE);
    let word = set_funct3(word, 0b011);
    let word = set_rs1(word, rs1);
    let word = set_rs2(word, rs2);
    set_s_imm(word, offset as u32)
}

pub fn ecall() -> u32 {
    set_opcode(0, SYSTEM)
}

pub fn ebreak() -> u32 {
    set_i_imm(set_opcode(0, SYSTEM), 1)
}

/// `exit(code)` as an instruction sequence.
pub fn exit(code: i32) -> [u32; 3] {
    [li(A0, code), li(A7, SYS_EXIT), ecall()]
}

pub const DATA_VADDR: u64 = 0x2_0000;

/// A statically linked RV64 executable with a text segment at `entry` and a
/// writable data segment at [`DATA_VADDR`].
pub fn build_elf(entry: u64, text: &[u32], data: &[u8]) -> Vec<u8> {
    const EHDR: u64 = 64;
    const PHDR: u64 = 56;

    let text: Vec<u8> = text.iter().flat_map(|w| w.to_le_bytes()).collect();
    let text_off = EHDR + 2 * PHDR;
    let data_off = text_off + text.len() as u64;

    let mut elf = Vec::new();
    elf.extend_from_slice(b"\x7fELF");
    elf.extend_from_slice(&[2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    elf.extend_from_slice(&2u16.to_le_bytes());
    elf.extend_from_slice(&243u16.to_le_bytes());
    elf.extend_from_slice(&1u32.to_le_bytes());
    elf.extend_from_slice(&entry.to_le_bytes());
    elf.extend_from_slice(&EHDR.to_le_bytes());
    elf.extend_from_slice(&0u64.to_le_bytes());
    elf.extend_from_slice(&0u32.to_le_bytes());
    for half in [EHDR as u16, PHDR as u16, 2, 64, 0, 0] {
        elf.extend_from_slice(&half.to_le_bytes());
    }

    for (offset, vaddr, size, flags) in [
        (text_off, entry, text.len() as u64, 0b101u32),
        (data_off, DATA_VADDR, data.len() as u64, 0b110u32),
    ] {
        elf.extend_from_slice(&1u32.to_le_bytes());
        elf.extend_from_slice(&flags.to_le_bytes());
        elf.extend_from_slice(&offset.to_le_bytes());
        elf.extend_from_slice(&vaddr.to_le_bytes());
        elf.extend_from_slice(&vaddr.to_le_bytes());
        elf.extend_from_slice(&size.to_le_bytes());
        elf.extend_from_slice(&size.to_le_bytes());
        elf.extend_from_slice(&0x1000u64.to_le_bytes());
    }

    elf.extend_from_slice(&text);
    elf.extend_from_slice(data);
    elf
}
