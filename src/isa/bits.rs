//! Bit-field codec for 32-bit instruction words.
//!
//! Field getters return the raw (unshifted, unsigned) value. Immediate getters
//! return the reassembled immediate without sign extension: 12 bits for I/S,
//! 13 bits for B (bit 0 always clear), the upper 20 bits already shifted into
//! place for U, 21 bits for J (bit 0 always clear). Setters take the same
//! representation, so `get(set(w, v)) == v` for every in-range `v`.

/// Extract `count` bits starting at `lsb`.
#[inline(always)]
pub const fn bits(word: u32, lsb: u32, count: u32) -> u32 {
    debug_assert!(count > 0 && lsb + count <= 32);
    if count == 32 {
        word
    } else {
        (word >> lsb) & ((1u32 << count) - 1)
    }
}

/// Replace `count` bits starting at `lsb` with the low bits of `value`.
#[inline(always)]
pub const fn set_bits(word: u32, lsb: u32, count: u32, value: u32) -> u32 {
    debug_assert!(count > 0 && lsb + count <= 32);
    let mask = if count == 32 {
        u32::MAX
    } else {
        ((1u32 << count) - 1) << lsb
    };
    (word & !mask) | ((value << lsb) & mask)
}

/// Sign-extend the low `WIDTH` bits of `value` to 64 bits.
#[inline(always)]
pub const fn sign_extend<const WIDTH: u32>(value: u64) -> u64 {
    const { assert!(WIDTH > 0 && WIDTH <= 64, "sign_extend width must be in 1..=64") };
    let shift = 64 - WIDTH;
    (((value << shift) as i64) >> shift) as u64
}

#[inline(always)]
pub const fn opcode(word: u32) -> u8 {
    bits(word, 0, 7) as u8
}

#[inline(always)]
pub const fn rd(word: u32) -> u8 {
    bits(word, 7, 5) as u8
}

#[inline(always)]
pub const fn funct3(word: u32) -> u8 {
    bits(word, 12, 3) as u8
}

#[inline(always)]
pub const fn rs1(word: u32) -> u8 {
    bits(word, 15, 5) as u8
}

#[inline(always)]
pub const fn rs2(word: u32) -> u8 {
    bits(word, 20, 5) as u8
}

#[inline(always)]
pub const fn funct7(word: u32) -> u8 {
    bits(word, 25, 7) as u8
}

/// Shift amount of the 32-bit shift-immediate forms.
#[inline(always)]
pub const fn shamt5(word: u32) -> u8 {
    bits(word, 20, 5) as u8
}

/// Shift amount of the 64-bit shift-immediate forms.
#[inline(always)]
pub const fn shamt6(word: u32) -> u8 {
    bits(word, 20, 6) as u8
}

pub const fn set_opcode(word: u32, value: u8) -> u32 {
    set_bits(word, 0, 7, value as u32)
}

pub const fn set_rd(word: u32, value: u8) -> u32 {
    set_bits(word, 7, 5, value as u32)
}

pub const fn set_funct3(word: u32, value: u8) -> u32 {
    set_bits(word, 12, 3, value as u32)
}

pub const fn set_rs1(word: u32, value: u8) -> u32 {
    set_bits(word, 15, 5, value as u32)
}

pub const fn set_rs2(word: u32, value: u8) -> u32 {
    set_bits(word, 20, 5, value as u32)
}

pub const fn set_funct7(word: u32, value: u8) -> u32 {
    set_bits(word, 25, 7, value as u32)
}

#[inline(always)]
pub const fn i_imm(word: u32) -> u32 {
    bits(word, 20, 12)
}

pub const fn set_i_imm(word: u32, imm: u32) -> u32 {
    set_bits(word, 20, 12, imm)
}

#[inline(always)]
pub const fn s_imm(word: u32) -> u32 {
    (bits(word, 25, 7) << 5) | bits(word, 7, 5)
}

pub const fn set_s_imm(word: u32, imm: u32) -> u32 {
    let word = set_bits(word, 7, 5, imm);
    set_bits(word, 25, 7, imm >> 5)
}

#[inline(always)]
pub const fn b_imm(word: u32) -> u32 {
    (bits(word, 31, 1) << 12)
        | (bits(word, 7, 1) << 11)
        | (bits(word, 25, 6) << 5)
        | (bits(word, 8, 4) << 1)
}

pub const fn set_b_imm(word: u32, imm: u32) -> u32 {
    let word = set_bits(word, 31, 1, imm >> 12);
    let word = set_bits(word, 7, 1, imm >> 11);
    let word = set_bits(word, 25, 6, imm >> 5);
    set_bits(word, 8, 4, imm >> 1)
}

#[inline(always)]
pub const fn u_imm(word: u32) -> u32 {
    word & 0xFFFF_F000
}

pub const fn set_u_imm(word: u32, imm: u32) -> u32 {
    (word & 0xFFF) | (imm & 0xFFFF_F000)
}

#[inline(always)]
pub const fn j_imm(word: u32) -> u32 {
    (bits(word, 31, 1) << 20)
        | (bits(word, 12, 8) << 12)
        | (bits(word, 20, 1) << 11)
        | (bits(word, 21, 10) << 1)
}

pub const fn set_j_imm(word: u32, imm: u32) -> u32 {
    let word = set_bits(word, 31, 1, imm >> 20);
    let word = set_bits(word, 12, 8, imm >> 12);
    let word = set_bits(word, 20, 1, imm >> 11);
    set_bits(word, 21, 10, imm >> 1)
}

// =============================================
//  Pattern masks for custom predicates
// =============================================

/// A fixed-bits pattern: `word & mask == key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeMask {
    pub key: u32,
    pub mask: u32,
}

impl DecodeMask {
    #[inline(always)]
    pub const fn matches(&self, word: u32) -> bool {
        (word & self.mask) == self.key
    }
}

/// Build a [`DecodeMask`] from a pattern like `"010000 ?????? ????? 101 ????? 0010011"`.
/// `0`/`1` are fixed bits, `?` is a don't-care; any other character is ignored.
pub const fn decode_mask(pattern: &str) -> DecodeMask {
    let bytes = pattern.as_bytes();
    let mut len = 0;
    let mut key = 0u32;
    let mut mask = 0u32;

    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'0' || ch == b'1' || ch == b'?' {
            len += 1;
            key = (key << 1) | (ch == b'1') as u32;
            mask = (mask << 1) | (ch != b'?') as u32;
        }
        i += 1;
    }

    assert!(len == 32, "decode pattern must describe exactly 32 bits");

    DecodeMask { key, mask }
}
