#![cfg_attr(debug_assertions, allow(dead_code))]

pub mod config;
pub mod cpu;
pub mod debugger;
pub mod event;
pub mod hart;
pub mod isa;
pub mod load;
pub mod mem;
pub mod trace;
pub mod utils;

use std::path::Path;

use crate::{
    config::{HartConfig, arch_config::WordType},
    hart::{
        Hart, bootstrap::ProcessArgs, executor::HaltReason, fault::Fault, state::HartState,
    },
    load::{LoadError, LoadedImage},
    mem::MemoryImage,
};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub halt_reason: Option<HaltReason>,
    pub exit_code: Option<i32>,
    pub pc: WordType,
}

impl RunSummary {
    fn from_state(hs: &HartState) -> Self {
        Self {
            halt_reason: hs.halt_reason(),
            exit_code: hs.exit_code(),
            pc: hs.pc.read(),
        }
    }
}

pub struct Emulator {
    hart: Hart,
}

impl Emulator {
    pub fn from_elf(path: &Path, config: HartConfig) -> Result<Self, LoadError> {
        let mut mem = MemoryImage::new(config.arena_size);
        let LoadedImage { entry, .. } = load::load_elf_file(&mut mem, path)?;
        Ok(Self::from_image(mem, entry, config))
    }

    pub fn from_binary(path: &Path, base: WordType, config: HartConfig) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)?;
        let mut mem = MemoryImage::new(config.arena_size);
        let LoadedImage { entry, .. } = load::load_bin(&mut mem, &bytes, base)?;
        Ok(Self::from_image(mem, entry, config))
    }

    pub fn from_image(mem: MemoryImage, entry: WordType, config: HartConfig) -> Self {
        Self {
            hart: Hart::new(mem, entry, config),
        }
    }

    pub fn from_hart(hart: Hart) -> Self {
        Self { hart }
    }

    pub fn hart(&self) -> &Hart {
        &self.hart
    }

    /// Attach tracers, stats or a debugger here before [`Self::run`].
    pub fn hart_mut(&mut self) -> &mut Hart {
        &mut self.hart
    }

    /// Start the program and block until it halts.
    pub fn run(&mut self, args: &ProcessArgs) -> Result<RunSummary, Fault> {
        self.hart.init(args)?;
        self.wait()
    }

    /// Block until a hart started elsewhere (e.g. by a debugger) finishes.
    pub fn wait(&mut self) -> Result<RunSummary, Fault> {
        self.hart.wait_till_done()?;
        let summary = self.hart.with_state(|hs| RunSummary::from_state(hs));
        log::info!("run finished: {:?}", summary);
        Ok(summary)
    }
}
