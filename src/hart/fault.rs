use thiserror::Error;

use crate::{config::arch_config::WordType, mem::MemError};

/// Unrecoverable condition that ends a run, or a rejected control request.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("illegal instruction {word:#010x} at {pc:#x}")]
    IllegalInstruction { word: u32, pc: WordType },

    #[error("access to unmapped address {0:#x}")]
    OutOfBounds(WordType),

    #[error("out of memory ({requested:#x} bytes requested)")]
    OutOfMemory { requested: WordType },

    #[error("region [{addr:#x}, +{size:#x}) overlaps a mapped region")]
    RegionOverlap { addr: WordType, size: WordType },

    #[error("unimplemented syscall {0}")]
    SyscallUnimplemented(u64),

    #[error("hart is not in a state that allows this operation")]
    InvalidState,
}

impl From<MemError> for Fault {
    fn from(err: MemError) -> Self {
        match err {
            MemError::OutOfBounds(addr) => Fault::OutOfBounds(addr),
            MemError::OutOfMemory { requested } => Fault::OutOfMemory { requested },
            MemError::RegionOverlap { addr, size } => Fault::RegionOverlap { addr, size },
        }
    }
}
