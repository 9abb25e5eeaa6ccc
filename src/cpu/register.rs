use crate::{
    config::arch_config::WordType,
    event::{Event, RegisterRead, RegisterWrite},
};

#[derive(Debug, Clone)]
pub struct Register {
    width: u32,
    value: WordType,
    name: &'static str,
    read_only: bool,
}

impl Register {
    pub fn new(name: &'static str, width: u32, read_only: bool) -> Self {
        debug_assert!(width > 0 && width <= WordType::BITS);
        Self {
            width,
            value: 0,
            name,
            read_only,
        }
    }

    fn mask(&self) -> WordType {
        if self.width == WordType::BITS {
            WordType::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get(&self) -> WordType {
        self.value
    }

    /// Store `value` masked to the register width. Read-only registers keep their value.
    pub fn set(&mut self, value: WordType) {
        if !self.read_only {
            self.value = value & self.mask();
        }
    }
}

/// An ordered, fixed-size set of registers with read and write channels.
#[derive(Debug)]
pub struct RegisterClass {
    name: &'static str,
    regs: Vec<Register>,
    pub(crate) on_read: Event<RegisterRead>,
    pub(crate) on_write: Event<RegisterWrite>,
}

impl RegisterClass {
    pub fn new(name: &'static str, regs: Vec<Register>) -> Self {
        Self {
            name,
            regs,
            on_read: Event::new(),
            on_write: Event::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn register(&self, idx: u8) -> &Register {
        &self.regs[idx as usize]
    }

    #[inline]
    pub fn read(&mut self, idx: u8) -> WordType {
        let value = self.regs[idx as usize].get();
        self.on_read.fire(&RegisterRead {
            class: self.name,
            index: idx,
            value,
        });
        value
    }

    #[inline]
    pub fn write(&mut self, idx: u8, value: WordType) {
        let reg = &mut self.regs[idx as usize];
        let old = reg.get();
        reg.set(value);
        self.on_write.fire(&RegisterWrite {
            class: self.name,
            index: idx,
            new: value,
            old,
        });
    }

    /// Uninstrumented read.
    pub fn raw(&self, idx: u8) -> WordType {
        self.regs[idx as usize].get()
    }

    /// Uninstrumented write; read-only registers still ignore it.
    pub fn set_raw(&mut self, idx: u8, value: WordType) {
        self.regs[idx as usize].set(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.regs.iter()
    }
}
