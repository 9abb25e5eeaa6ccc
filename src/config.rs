pub mod arch_config {
    use crate::gen_name_list;

    pub type WordType = u64;
    pub type SignedWordType = i64;

    pub const XLEN: usize = 64;
    pub const REGFILE_CNT: usize = 32;

    /// ABI names of the integer registers, indexed by register number.
    pub const REG_NAME: [&str; REGFILE_CNT] = [
        "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0/fp", "s1", "a0", "a1", "a2", "a3",
        "a4", "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3",
        "t4", "t5", "t6",
    ];

    pub const REG_NUMERIC_NAME: [&str; REGFILE_CNT] = gen_name_list!("x"; 0, 31);

    /// Register name (ABI or numeric) to index.
    pub static REG_INDEX: phf::Map<&'static str, u8> = phf::phf_map! {
        "zero" => 0, "ra" => 1, "sp" => 2, "gp" => 3, "tp" => 4,
        "t0" => 5, "t1" => 6, "t2" => 7, "s0" => 8, "fp" => 8, "s1" => 9,
        "a0" => 10, "a1" => 11, "a2" => 12, "a3" => 13, "a4" => 14, "a5" => 15, "a6" => 16, "a7" => 17,
        "s2" => 18, "s3" => 19, "s4" => 20, "s5" => 21, "s6" => 22, "s7" => 23,
        "s8" => 24, "s9" => 25, "s10" => 26, "s11" => 27,
        "t3" => 28, "t4" => 29, "t5" => 30, "t6" => 31,
    };

    /// Resolve `a0`, `fp` or `x10` style register names.
    pub fn parse_reg_name(name: &str) -> Option<u8> {
        let name = name.trim();
        if let Some(idx) = REG_INDEX.get(name) {
            return Some(*idx);
        }

        name.strip_prefix('x')
            .and_then(|rest| rest.parse::<u8>().ok())
            .filter(|n| (*n as usize) < REGFILE_CNT)
    }
}

pub mod mem_config {
    /// Byte budget shared by all regions of a memory image.
    pub const DEFAULT_ARENA_SIZE: u64 = 0x1000_0000;
    pub const PAGE_SIZE: u64 = 4096;
}

pub mod process_config {
    pub const HEAP_START: u64 = 0x1_0000_0000;
    pub const STACK_START: u64 = 0x7fff_ffff_0000_0000;
    pub const STACK_SIZE: u64 = 0x10000;
    pub const MMAP_BASE: u64 = 0x2000_0000_0000;
    /// The initial stack image is padded to this alignment.
    pub const STACK_ALIGN: u64 = 128;
    pub const DEFAULT_SEED: u64 = 0x5eed;
}

use crate::config::{
    mem_config::DEFAULT_ARENA_SIZE,
    process_config::{DEFAULT_SEED, HEAP_START, MMAP_BASE, STACK_SIZE, STACK_START},
};

/// Runtime knobs for one hart and the process image it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HartConfig {
    pub arena_size: u64,
    pub heap_start: u64,
    pub stack_start: u64,
    pub stack_size: u64,
    pub mmap_base: u64,
    /// Seed of the generator behind `AT_RANDOM` and `getrandom`.
    pub seed: u64,
}

impl Default for HartConfig {
    fn default() -> Self {
        Self {
            arena_size: DEFAULT_ARENA_SIZE,
            heap_start: HEAP_START,
            stack_start: STACK_START,
            stack_size: STACK_SIZE,
            mmap_base: MMAP_BASE,
            seed: DEFAULT_SEED,
        }
    }
}
