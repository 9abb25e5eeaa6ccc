use std::fmt::Display;

use lazy_static::lazy_static;
use smallvec::SmallVec;

use crate::isa::{
    instruction::{
        RVInstrDesc, RVInstrInfo, RiscvInstr,
        instr_table::{TABLE_RV32I, TABLE_RV32M, TABLE_RV64I, TABLE_RV64M},
    },
    utils::ISABuilder,
};

lazy_static! {
    /// Decoder over every table the hart executes.
    pub static ref DECODER: Decoder = Decoder::new();
}

/// Result of matching one word against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Unknown,
    /// Index into [`Decoder::entries`].
    Known(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeInstr(pub RiscvInstr, pub RVInstrInfo);

impl Display for DecodeInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}, {:?}", self.0, self.1)
    }
}

pub struct Decoder {
    entries: Vec<RVInstrDesc>,
}

impl Decoder {
    pub fn new() -> Self {
        let isa = ISABuilder::new()
            .add(TABLE_RV32I)
            .add(TABLE_RV64I)
            .add(TABLE_RV32M)
            .add(TABLE_RV64M)
            .build();
        Self::from_isa(&isa)
    }

    pub fn from_isa(instrs: &[RVInstrDesc]) -> Self {
        Self {
            entries: instrs.to_vec(),
        }
    }

    pub fn entries(&self) -> &[RVInstrDesc] {
        &self.entries
    }

    /// # Panics
    /// If `opcode` is [`Opcode::Unknown`] or was produced by another decoder.
    pub fn entry(&self, opcode: Opcode) -> &RVInstrDesc {
        match opcode {
            Opcode::Known(idx) => &self.entries[idx],
            Opcode::Unknown => panic!("no table entry for an unknown opcode"),
        }
    }

    /// Scan every entry and keep the matching one with the smallest precedence.
    pub fn decode(&self, word: u32) -> Opcode {
        let mut best: Option<(usize, u32)> = None;

        for (idx, desc) in self.entries.iter().enumerate() {
            if !desc.encoding.matches(word) {
                continue;
            }

            match best {
                Some((best_idx, prec)) if desc.precedence == prec => {
                    debug_assert!(
                        false,
                        "{} and {} match {:#010x} with equal precedence {}",
                        self.entries[best_idx].full_name(),
                        desc.full_name(),
                        word,
                        prec
                    );
                }
                Some((_, prec)) if desc.precedence > prec => {}
                _ => best = Some((idx, desc.precedence)),
            }
        }

        best.map_or(Opcode::Unknown, |(idx, _)| Opcode::Known(idx))
    }

    /// Decode and extract the operands of `word`.
    pub fn decode_instr(&self, word: u32) -> Option<DecodeInstr> {
        match self.decode(word) {
            Opcode::Unknown => None,
            opcode @ Opcode::Known(_) => {
                let desc = self.entry(opcode);
                Some(DecodeInstr(desc.instr, desc.encoding.layout().extract(word)))
            }
        }
    }

    /// Every entry matching `word`, in table order.
    pub fn candidates(&self, word: u32) -> SmallVec<[&RVInstrDesc; 2]> {
        self.entries
            .iter()
            .filter(|desc| desc.encoding.matches(word))
            .collect()
    }

    /// Find an entry by extension prefix and name, e.g. `("rv32i", "addi")`.
    pub fn lookup(&self, prefix: &str, name: &str) -> Option<&RVInstrDesc> {
        self.entries.iter().find(|desc| {
            desc.prefix().eq_ignore_ascii_case(prefix) && desc.name().eq_ignore_ascii_case(name)
        })
    }

    /// Find an entry by bare name. Among duplicates the smallest precedence wins.
    pub fn lookup_name(&self, name: &str) -> Option<&RVInstrDesc> {
        self.entries
            .iter()
            .filter(|desc| desc.name().eq_ignore_ascii_case(name))
            .min_by_key(|desc| desc.precedence)
    }
}
