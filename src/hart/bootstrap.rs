//! Initial process image: heap, stack with argv/envp/auxv, mmap area.

use num_enum::IntoPrimitive;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::{
    config::{HartConfig, arch_config::WordType, mem_config::PAGE_SIZE, process_config::STACK_ALIGN},
    hart::{
        fault::Fault,
        state::{HartState, names},
    },
    mem::MemError,
    utils::align_up,
};

const REG_SP: u8 = 2;
const AT_RANDOM_BYTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u64)]
pub enum AuxvType {
    Null = 0,
    PageSz = 6,
    Random = 25,
}

/// Command line and environment handed to the guest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessArgs {
    pub argv: Vec<String>,
    pub envp: Vec<(String, String)>,
}

impl ProcessArgs {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            envp: Vec::new(),
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envp.push((key.to_string(), value.to_string()));
        self
    }
}

/// Move the program break to `new_end`, growing the heap region when needed.
pub(crate) fn grow_heap(hs: &mut HartState, new_end: WordType) -> Result<(), MemError> {
    let start = hs
        .named_address(names::HEAP_START)
        .ok_or(MemError::OutOfBounds(new_end))?;
    let size = new_end.saturating_sub(start);

    let mapped = hs
        .mem()
        .regions()
        .find(|r| r.base() == start)
        .map(|r| r.size());

    match mapped {
        Some(mapped) if mapped >= size => {}
        Some(_) => hs.mem_mut().resize(start, size)?,
        None => hs.mem_mut().allocate(start, size)?,
    }

    hs.set_named_address(names::HEAP_END, new_end);
    Ok(())
}

/// Bump-allocate `len` bytes at the program break.
fn heap_alloc(hs: &mut HartState, len: usize) -> Result<WordType, Fault> {
    let addr = hs
        .named_address(names::HEAP_END)
        .ok_or(Fault::InvalidState)?;
    grow_heap(hs, addr + len as WordType)?;
    Ok(addr)
}

/// Copy `s` and a terminating NUL onto the heap.
fn heap_str(hs: &mut HartState, s: &str) -> Result<WordType, Fault> {
    let addr = heap_alloc(hs, s.len() + 1)?;
    hs.mem_mut()
        .raw_slice_mut(addr, s.len())?
        .copy_from_slice(s.as_bytes());
    Ok(addr)
}

pub fn init_process(
    hs: &mut HartState,
    args: &ProcessArgs,
    config: &HartConfig,
) -> Result<(), Fault> {
    // heap starts empty
    hs.set_named_address(names::HEAP_START, config.heap_start);
    hs.set_named_address(names::HEAP_END, config.heap_start);
    hs.set_named_address(names::MMAP_NEXT, config.mmap_base);

    let stack_start = config.stack_start;
    let stack_end = stack_start + config.stack_size;
    hs.mem_mut().allocate(stack_start, config.stack_size)?;
    hs.set_named_address(names::STACK_START, stack_start);
    hs.set_named_address(names::STACK_END, stack_end);

    let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
    let random = heap_alloc(hs, AT_RANDOM_BYTES)?;
    rng.fill_bytes(hs.mem_mut().raw_slice_mut(random, AT_RANDOM_BYTES)?);

    let auxv: [(AuxvType, WordType); 3] = [
        (AuxvType::PageSz, PAGE_SIZE),
        (AuxvType::Random, random),
        (AuxvType::Null, 0),
    ];

    let mut image: Vec<WordType> = Vec::new();
    image.push(args.argv.len() as WordType);
    for arg in &args.argv {
        image.push(heap_str(hs, arg)?);
    }
    image.push(0);
    for (key, value) in &args.envp {
        image.push(heap_str(hs, &format!("{key}={value}"))?);
    }
    image.push(0);
    for (ty, value) in auxv {
        image.push(ty.into());
        image.push(value);
    }

    let image_size = (image.len() * 8) as WordType;
    let setup_size = align_up(image_size, STACK_ALIGN).ok_or(Fault::OutOfMemory {
        requested: image_size,
    })?;
    if setup_size > config.stack_size {
        return Err(Fault::OutOfMemory {
            requested: setup_size,
        });
    }

    let sp = stack_end - setup_size;
    for (i, word) in image.iter().enumerate() {
        hs.mem_mut().poke(sp + 8 * i as WordType, *word)?;
    }
    hs.rf_mut().set_raw(REG_SP, sp);

    log::debug!(
        "process: sp={:#x} heap=[{:#x}, {:#x}) argc={}",
        sp,
        config.heap_start,
        hs.named_address(names::HEAP_END).unwrap_or_default(),
        args.argv.len()
    );
    Ok(())
}
