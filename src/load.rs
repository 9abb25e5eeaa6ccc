//! Put guest programs into a [`MemoryImage`].

use std::path::Path;

use thiserror::Error;
use xmas_elf::{ElfFile, program::Type};

use crate::{
    config::{arch_config::WordType, mem_config::PAGE_SIZE},
    mem::{MemError, MemoryImage},
    utils::{align_down, align_up},
};

const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EM_RISCV: u16 = 243;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid elf: {0}")]
    Elf(&'static str),
    #[error("not a 64-bit elf")]
    NotElf64,
    #[error("not a little-endian elf")]
    NotLittleEndian,
    #[error("elf machine {0} is not RISC-V")]
    WrongMachine(u16),
    #[error("segment at {vaddr:#x} lies outside the file")]
    Truncated { vaddr: WordType },
    #[error("segment at {vaddr:#x} runs past the end of the address space")]
    AddressOverflow { vaddr: WordType },
    #[error(transparent)]
    Memory(#[from] MemError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub vaddr: WordType,
    pub file_size: WordType,
    pub mem_size: WordType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub entry: WordType,
    pub segments: Vec<Segment>,
}

fn check_header(bytes: &[u8]) -> Result<(), LoadError> {
    if bytes.len() < 20 || bytes[..4] != [0x7f, b'E', b'L', b'F'] {
        return Err(LoadError::Elf("bad magic"));
    }
    if bytes[4] != ELFCLASS64 {
        return Err(LoadError::NotElf64);
    }
    if bytes[5] != ELFDATA2LSB {
        return Err(LoadError::NotLittleEndian);
    }
    let machine = u16::from_le_bytes([bytes[18], bytes[19]]);
    if machine != EM_RISCV {
        return Err(LoadError::WrongMachine(machine));
    }
    Ok(())
}

/// Merge page-aligned spans so segments sharing a page map one region.
fn merge_spans(mut spans: Vec<(WordType, WordType)>) -> Vec<(WordType, WordType)> {
    spans.sort_unstable();
    let mut merged: Vec<(WordType, WordType)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

pub fn load_elf(mem: &mut MemoryImage, bytes: &[u8]) -> Result<LoadedImage, LoadError> {
    check_header(bytes)?;
    let elf = ElfFile::new(bytes).map_err(LoadError::Elf)?;

    let mut segments = Vec::new();
    let mut data = Vec::new();
    for ph in elf.program_iter() {
        if ph.get_type().map_err(LoadError::Elf)? != Type::Load || ph.mem_size() == 0 {
            continue;
        }

        let vaddr = ph.virtual_addr();
        let start = ph.offset() as usize;
        let end = start
            .checked_add(ph.file_size() as usize)
            .filter(|&end| end <= bytes.len() && ph.file_size() <= ph.mem_size())
            .ok_or(LoadError::Truncated { vaddr })?;

        segments.push(Segment {
            vaddr,
            file_size: ph.file_size(),
            mem_size: ph.mem_size(),
        });
        data.push(&bytes[start..end]);
    }

    let spans = segments
        .iter()
        .map(|s| {
            s.vaddr
                .checked_add(s.mem_size)
                .and_then(|end| align_up(end, PAGE_SIZE))
                .map(|end| (align_down(s.vaddr, PAGE_SIZE), end))
                .ok_or(LoadError::AddressOverflow { vaddr: s.vaddr })
        })
        .collect::<Result<_, _>>()?;
    for (start, end) in merge_spans(spans) {
        log::debug!("elf: mapping [{:#x}, {:#x})", start, end);
        mem.allocate(start, end - start)?;
    }

    // fresh regions are zero-filled, which covers .bss
    for (segment, data) in segments.iter().zip(data) {
        mem.raw_slice_mut(segment.vaddr, data.len())?
            .copy_from_slice(data);
    }

    let entry = elf.header.pt2.entry_point();
    log::info!("elf: {} segments, entry {:#x}", segments.len(), entry);
    Ok(LoadedImage { entry, segments })
}

/// Map a flat binary at `base`; execution starts at `base`.
pub fn load_bin(
    mem: &mut MemoryImage,
    bytes: &[u8],
    base: WordType,
) -> Result<LoadedImage, LoadError> {
    let size = bytes.len() as WordType;
    let span = align_up(size.max(1), PAGE_SIZE).ok_or(LoadError::AddressOverflow { vaddr: base })?;
    mem.allocate(base, span)?;
    mem.raw_slice_mut(base, bytes.len())?.copy_from_slice(bytes);

    Ok(LoadedImage {
        entry: base,
        segments: vec![Segment {
            vaddr: base,
            file_size: size,
            mem_size: size,
        }],
    })
}

pub fn load_elf_file(mem: &mut MemoryImage, path: &Path) -> Result<LoadedImage, LoadError> {
    let bytes = std::fs::read(path)?;
    load_elf(mem, &bytes)
}
