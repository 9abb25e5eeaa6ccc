use crate::{
    define_riscv_isa,
    isa::{
        bits::{DecodeMask, decode_mask},
        disasm::{print_fence, print_load, print_none, print_shift_imm, print_store},
        instruction::{Encoding, InstrFormat, RVInstrDesc, exec_function::*},
    },
};

const OP_LUI: u8 = 0b0110111;
const OP_AUIPC: u8 = 0b0010111;
const OP_JAL: u8 = 0b1101111;
const OP_JALR: u8 = 0b1100111;
const OP_BRANCH: u8 = 0b1100011;
const OP_LOAD: u8 = 0b0000011;
const OP_STORE: u8 = 0b0100011;
const OP_IMM: u8 = 0b0010011;
const OP_IMM_32: u8 = 0b0011011;
const OP_REG: u8 = 0b0110011;
const OP_REG_32: u8 = 0b0111011;
const OP_MISC_MEM: u8 = 0b0001111;

const SRAI_MASK: DecodeMask = decode_mask("010000 ?????? ????? 101 ????? 0010011");
const ECALL_MASK: DecodeMask = decode_mask("000000000000 00000 000 00000 1110011");
const EBREAK_MASK: DecodeMask = decode_mask("000000000001 00000 000 00000 1110011");

// `SRLI` is matched by opcode/funct3 alone, so it also accepts `SRAI` words.
// `SRAI` resolves the overlap by checking funct6 and a smaller precedence.
fn is_srai(word: u32) -> bool {
    SRAI_MASK.matches(word)
}

fn is_ecall(word: u32) -> bool {
    ECALL_MASK.matches(word)
}

fn is_ebreak(word: u32) -> bool {
    EBREAK_MASK.matches(word)
}

define_riscv_isa!(
    RiscvInstr,
    rv32i, TABLE_RV32I, {
        LUI { encoding: Encoding::U { opcode: OP_LUI }, precedence: 100, exec: exec_lui, },
        AUIPC { encoding: Encoding::U { opcode: OP_AUIPC }, precedence: 100, exec: exec_auipc, },
        JAL { encoding: Encoding::J { opcode: OP_JAL }, precedence: 100, exec: exec_jal, },
        JALR { encoding: Encoding::I { opcode: OP_JALR, funct3: 0b000 }, precedence: 100, exec: exec_jalr, print: print_load, },

        BEQ { encoding: Encoding::B { opcode: OP_BRANCH, funct3: 0b000 }, precedence: 100, exec: exec_branch::<ExecEqual>, },
        BNE { encoding: Encoding::B { opcode: OP_BRANCH, funct3: 0b001 }, precedence: 100, exec: exec_branch::<ExecNotEqual>, },
        BLT { encoding: Encoding::B { opcode: OP_BRANCH, funct3: 0b100 }, precedence: 100, exec: exec_branch::<ExecSignedLess>, },
        BGE { encoding: Encoding::B { opcode: OP_BRANCH, funct3: 0b101 }, precedence: 100, exec: exec_branch::<ExecSignedGreatEqual>, },
        BLTU { encoding: Encoding::B { opcode: OP_BRANCH, funct3: 0b110 }, precedence: 100, exec: exec_branch::<ExecUnsignedLess>, },
        BGEU { encoding: Encoding::B { opcode: OP_BRANCH, funct3: 0b111 }, precedence: 100, exec: exec_branch::<ExecUnsignedGreatEqual>, },

        LB { encoding: Encoding::I { opcode: OP_LOAD, funct3: 0b000 }, precedence: 100, exec: exec_load::<u8, true>, print: print_load, },
        LH { encoding: Encoding::I { opcode: OP_LOAD, funct3: 0b001 }, precedence: 100, exec: exec_load::<u16, true>, print: print_load, },
        LW { encoding: Encoding::I { opcode: OP_LOAD, funct3: 0b010 }, precedence: 100, exec: exec_load::<u32, true>, print: print_load, },
        LBU { encoding: Encoding::I { opcode: OP_LOAD, funct3: 0b100 }, precedence: 100, exec: exec_load::<u8, false>, print: print_load, },
        LHU { encoding: Encoding::I { opcode: OP_LOAD, funct3: 0b101 }, precedence: 100, exec: exec_load::<u16, false>, print: print_load, },

        SB { encoding: Encoding::S { opcode: OP_STORE, funct3: 0b000 }, precedence: 100, exec: exec_store::<u8>, print: print_store, },
        SH { encoding: Encoding::S { opcode: OP_STORE, funct3: 0b001 }, precedence: 100, exec: exec_store::<u16>, print: print_store, },
        SW { encoding: Encoding::S { opcode: OP_STORE, funct3: 0b010 }, precedence: 100, exec: exec_store::<u32>, print: print_store, },

        ADDI { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b000 }, precedence: 100, exec: exec_arith::<ExecAdd>, },
        SLTI { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b010 }, precedence: 100, exec: exec_arith::<ExecSignedLess>, },
        SLTIU { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b011 }, precedence: 100, exec: exec_arith::<ExecUnsignedLess>, },
        XORI { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b100 }, precedence: 100, exec: exec_arith::<ExecXor>, },
        ORI { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b110 }, precedence: 100, exec: exec_arith::<ExecOr>, },
        ANDI { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b111 }, precedence: 100, exec: exec_arith::<ExecAnd>, },
        SLLI { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b001 }, precedence: 100, exec: exec_shift_imm::<ExecSLL, 0x3F>, print: print_shift_imm, },
        SRLI { encoding: Encoding::I { opcode: OP_IMM, funct3: 0b101 }, precedence: 100, exec: exec_shift_imm::<ExecSRL, 0x3F>, print: print_shift_imm, },
        SRAI { encoding: Encoding::Custom { layout: InstrFormat::I, matches: is_srai }, precedence: 50, exec: exec_shift_imm::<ExecSRA, 0x3F>, print: print_shift_imm, },

        ADD { encoding: Encoding::R { opcode: OP_REG, funct3: 0b000, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecAdd>, },
        SUB { encoding: Encoding::R { opcode: OP_REG, funct3: 0b000, funct7: 0b0100000 }, precedence: 100, exec: exec_arith::<ExecSub>, },
        SLL { encoding: Encoding::R { opcode: OP_REG, funct3: 0b001, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecSLL>, },
        SLT { encoding: Encoding::R { opcode: OP_REG, funct3: 0b010, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecSignedLess>, },
        SLTU { encoding: Encoding::R { opcode: OP_REG, funct3: 0b011, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecUnsignedLess>, },
        XOR { encoding: Encoding::R { opcode: OP_REG, funct3: 0b100, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecXor>, },
        SRL { encoding: Encoding::R { opcode: OP_REG, funct3: 0b101, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecSRL>, },
        SRA { encoding: Encoding::R { opcode: OP_REG, funct3: 0b101, funct7: 0b0100000 }, precedence: 100, exec: exec_arith::<ExecSRA>, },
        OR { encoding: Encoding::R { opcode: OP_REG, funct3: 0b110, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecOr>, },
        AND { encoding: Encoding::R { opcode: OP_REG, funct3: 0b111, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecAnd>, },

        FENCE { encoding: Encoding::I { opcode: OP_MISC_MEM, funct3: 0b000 }, precedence: 100, exec: exec_nop, print: print_fence, },
        FENCE_I { encoding: Encoding::I { opcode: OP_MISC_MEM, funct3: 0b001 }, precedence: 100, exec: exec_nop, print: print_fence, },
        ECALL { encoding: Encoding::Custom { layout: InstrFormat::None, matches: is_ecall }, precedence: 50, exec: exec_ecall, print: print_none, },
        EBREAK { encoding: Encoding::Custom { layout: InstrFormat::None, matches: is_ebreak }, precedence: 50, exec: exec_ebreak, print: print_none, },
    },
    rv64i, TABLE_RV64I, {
        LWU { encoding: Encoding::I { opcode: OP_LOAD, funct3: 0b110 }, precedence: 100, exec: exec_load::<u32, false>, print: print_load, },
        LD { encoding: Encoding::I { opcode: OP_LOAD, funct3: 0b011 }, precedence: 100, exec: exec_load::<u64, false>, print: print_load, },
        SD { encoding: Encoding::S { opcode: OP_STORE, funct3: 0b011 }, precedence: 100, exec: exec_store::<u64>, print: print_store, },

        ADDIW { encoding: Encoding::I { opcode: OP_IMM_32, funct3: 0b000 }, precedence: 100, exec: exec_arith::<ExecAddw>, },
        SLLIW { encoding: Encoding::R { opcode: OP_IMM_32, funct3: 0b001, funct7: 0b0000000 }, precedence: 100, exec: exec_shift_imm_w::<ExecSLLW>, print: print_shift_imm, },
        SRLIW { encoding: Encoding::R { opcode: OP_IMM_32, funct3: 0b101, funct7: 0b0000000 }, precedence: 100, exec: exec_shift_imm_w::<ExecSRLW>, print: print_shift_imm, },
        SRAIW { encoding: Encoding::R { opcode: OP_IMM_32, funct3: 0b101, funct7: 0b0100000 }, precedence: 100, exec: exec_shift_imm_w::<ExecSRAW>, print: print_shift_imm, },

        ADDW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b000, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecAddw>, },
        SUBW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b000, funct7: 0b0100000 }, precedence: 100, exec: exec_arith::<ExecSubw>, },
        SLLW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b001, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecSLLW>, },
        SRLW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b101, funct7: 0b0000000 }, precedence: 100, exec: exec_arith::<ExecSRLW>, },
        SRAW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b101, funct7: 0b0100000 }, precedence: 100, exec: exec_arith::<ExecSRAW>, },
    },
    rv32m, TABLE_RV32M, {
        MUL { encoding: Encoding::R { opcode: OP_REG, funct3: 0b000, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecMulLow>, },
        MULH { encoding: Encoding::R { opcode: OP_REG, funct3: 0b001, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecMulHighSigned>, },
        MULHSU { encoding: Encoding::R { opcode: OP_REG, funct3: 0b010, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecMulHighSignedUnsigned>, },
        MULHU { encoding: Encoding::R { opcode: OP_REG, funct3: 0b011, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecMulHighUnsigned>, },
        DIV { encoding: Encoding::R { opcode: OP_REG, funct3: 0b100, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecDivSigned>, },
        DIVU { encoding: Encoding::R { opcode: OP_REG, funct3: 0b101, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecDivUnsigned>, },
        REM { encoding: Encoding::R { opcode: OP_REG, funct3: 0b110, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecRemSigned>, },
        REMU { encoding: Encoding::R { opcode: OP_REG, funct3: 0b111, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecRemUnsigned>, },
    },
    rv64m, TABLE_RV64M, {
        MULW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b000, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecMulw>, },
        DIVW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b100, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecDivw>, },
        DIVUW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b101, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecDivuw>, },
        REMW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b110, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecRemw>, },
        REMUW { encoding: Encoding::R { opcode: OP_REG_32, funct3: 0b111, funct7: 0b0000001 }, precedence: 100, exec: exec_arith::<ExecRemuw>, },
    },
);
