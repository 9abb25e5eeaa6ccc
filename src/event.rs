//! Synchronous listener lists.
//!
//! Every observable component owns its channels; firing calls each listener
//! in subscription order on the calling thread.

use std::fmt::Debug;

use smallvec::SmallVec;

use crate::config::arch_config::WordType;

pub type Listener<T> = Box<dyn FnMut(&T) + Send + 'static>;

pub struct Event<T: ?Sized> {
    listeners: SmallVec<[Listener<T>; 2]>,
}

impl<T: ?Sized> Event<T> {
    pub fn new() -> Self {
        Self {
            listeners: SmallVec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    #[inline]
    pub fn fire(&mut self, payload: &T) {
        for listener in self.listeners.iter_mut() {
            listener(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<T: ?Sized> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event({} listeners)", self.listeners.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRead {
    pub class: &'static str,
    pub index: u8,
    pub value: WordType,
}

/// `new` is the value the guest tried to write, even when the register is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub class: &'static str,
    pub index: u8,
    pub new: WordType,
    pub old: WordType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAllocate {
    pub addr: WordType,
    pub size: WordType,
}

/// `width` is in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRead {
    pub addr: WordType,
    pub value: WordType,
    pub width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWrite {
    pub addr: WordType,
    pub new: WordType,
    pub old: WordType,
    pub width: usize,
}
