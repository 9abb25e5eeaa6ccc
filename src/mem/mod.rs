//! Sparse guest memory: a set of non-overlapping regions under a byte budget.

mod region;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    config::{arch_config::WordType, mem_config::DEFAULT_ARENA_SIZE},
    event::{Event, MemoryAllocate, MemoryRead, MemoryWrite},
    utils::UnsignedInteger,
};

pub use region::MemRegion;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    #[error("address {0:#x} is outside every mapped region")]
    OutOfBounds(WordType),
    #[error("memory arena exhausted ({requested:#x} bytes requested)")]
    OutOfMemory { requested: WordType },
    #[error("region [{addr:#x}, +{size:#x}) overlaps a mapped region")]
    RegionOverlap { addr: WordType, size: WordType },
}

pub struct MemoryImage {
    regions: BTreeMap<WordType, MemRegion>,
    capacity: WordType,
    used: WordType,

    pub(crate) on_allocate: Event<MemoryAllocate>,
    pub(crate) on_read: Event<MemoryRead>,
    pub(crate) on_write: Event<MemoryWrite>,
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_SIZE)
    }
}

impl std::fmt::Debug for MemoryImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImage")
            .field("regions", &self.regions.values().collect::<Vec<_>>())
            .field("used", &self.used)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl MemoryImage {
    /// An empty image that may hold at most `capacity` bytes across all regions.
    pub fn new(capacity: WordType) -> Self {
        Self {
            regions: BTreeMap::new(),
            capacity,
            used: 0,
            on_allocate: Event::new(),
            on_read: Event::new(),
            on_write: Event::new(),
        }
    }

    pub fn capacity(&self) -> WordType {
        self.capacity
    }

    pub fn used(&self) -> WordType {
        self.used
    }

    pub fn regions(&self) -> impl Iterator<Item = &MemRegion> {
        self.regions.values()
    }

    fn overlaps(&self, addr: WordType, end: WordType, skip: Option<WordType>) -> bool {
        self.regions
            .range(..end)
            .rev()
            .filter(|(base, _)| Some(**base) != skip)
            .take_while(|(_, region)| region.end() > addr)
            .next()
            .is_some()
    }

    fn fits(&self, used: WordType, extra: WordType) -> bool {
        used.checked_add(extra)
            .is_some_and(|total| total <= self.capacity)
    }

    /// Map `[addr, addr + size)`. A zero-sized request maps nothing.
    pub fn allocate(&mut self, addr: WordType, size: WordType) -> Result<(), MemError> {
        if size == 0 {
            return Ok(());
        }

        let end = addr
            .checked_add(size)
            .ok_or(MemError::RegionOverlap { addr, size })?;

        if self.overlaps(addr, end, None) {
            return Err(MemError::RegionOverlap { addr, size });
        }

        if !self.fits(self.used, size) {
            return Err(MemError::OutOfMemory { requested: size });
        }

        log::debug!("memory: allocate [{:#x}, {:#x})", addr, end);

        let region =
            MemRegion::new(addr, size).ok_or(MemError::OutOfMemory { requested: size })?;
        self.regions.insert(addr, region);
        self.used += size;
        self.on_allocate.fire(&MemoryAllocate { addr, size });
        Ok(())
    }

    /// Change the size of the region starting exactly at `base`. Growth fires
    /// an allocate event for the added range.
    pub fn resize(&mut self, base: WordType, new_size: WordType) -> Result<(), MemError> {
        let old_size = self
            .regions
            .get(&base)
            .map(MemRegion::size)
            .ok_or(MemError::OutOfBounds(base))?;

        if new_size > old_size {
            let end = base.checked_add(new_size).ok_or(MemError::RegionOverlap {
                addr: base,
                size: new_size,
            })?;
            if self.overlaps(base, end, Some(base)) {
                return Err(MemError::RegionOverlap {
                    addr: base,
                    size: new_size,
                });
            }
            if !self.fits(self.used - old_size, new_size) {
                return Err(MemError::OutOfMemory {
                    requested: new_size - old_size,
                });
            }
        }

        if let Some(region) = self.regions.get_mut(&base) {
            region.resize(new_size).ok_or(MemError::OutOfMemory {
                requested: new_size.saturating_sub(old_size),
            })?;
        }
        self.used = self.used - old_size + new_size;

        if new_size > old_size {
            log::debug!(
                "memory: grow [{:#x}, {:#x}) to {:#x}",
                base,
                base + old_size,
                base + new_size
            );
            self.on_allocate.fire(&MemoryAllocate {
                addr: base + old_size,
                size: new_size - old_size,
            });
        }
        Ok(())
    }

    /// Unmap the region starting exactly at `base`, returning its size.
    pub fn release(&mut self, base: WordType) -> Result<WordType, MemError> {
        let region = self
            .regions
            .remove(&base)
            .ok_or(MemError::OutOfBounds(base))?;
        self.used -= region.size();
        Ok(region.size())
    }

    pub fn contains(&self, addr: WordType) -> bool {
        self.region_of(addr, 1).is_some()
    }

    fn region_of(&self, addr: WordType, len: WordType) -> Option<&MemRegion> {
        self.regions
            .range(..=addr)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.covers(addr, len))
    }

    fn region_of_mut(&mut self, addr: WordType, len: WordType) -> Option<&mut MemRegion> {
        self.regions
            .range_mut(..=addr)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.covers(addr, len))
    }

    /// Uninstrumented view of `len` bytes that must lie inside one region.
    pub fn raw_slice(&self, addr: WordType, len: usize) -> Result<&[u8], MemError> {
        if len == 0 {
            return Ok(&[]);
        }
        self.region_of(addr, len as WordType)
            .map(|region| region.bytes(addr, len))
            .ok_or(MemError::OutOfBounds(addr))
    }

    pub fn raw_slice_mut(&mut self, addr: WordType, len: usize) -> Result<&mut [u8], MemError> {
        if len == 0 {
            return Ok(&mut []);
        }
        self.region_of_mut(addr, len as WordType)
            .map(|region| region.bytes_mut(addr, len))
            .ok_or(MemError::OutOfBounds(addr))
    }

    fn load_le(&self, addr: WordType, width: usize) -> Result<WordType, MemError> {
        let bytes = self.raw_slice(addr, width)?;
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(bytes);
        Ok(WordType::from_le_bytes(buf))
    }

    /// Instruction fetch. No read event is fired.
    pub fn fetch_u32(&self, addr: WordType) -> Result<u32, MemError> {
        self.load_le(addr, 4).map(|v| v as u32)
    }

    /// Uninstrumented typed read, for the debugger and syscalls.
    pub fn peek<T: UnsignedInteger>(&self, addr: WordType) -> Result<T, MemError> {
        self.load_le(addr, T::BYTES).map(T::truncate_from)
    }

    /// Uninstrumented typed write.
    pub fn poke<T: UnsignedInteger>(&mut self, addr: WordType, data: T) -> Result<(), MemError> {
        let value: WordType = data.into();
        self.raw_slice_mut(addr, T::BYTES)?
            .copy_from_slice(&value.to_le_bytes()[..T::BYTES]);
        Ok(())
    }

    pub fn read<T: UnsignedInteger>(&mut self, addr: WordType) -> Result<T, MemError> {
        let value = self.load_le(addr, T::BYTES)?;
        self.on_read.fire(&MemoryRead {
            addr,
            value,
            width: T::BYTES,
        });
        Ok(T::truncate_from(value))
    }

    pub fn write<T: UnsignedInteger>(&mut self, addr: WordType, data: T) -> Result<(), MemError> {
        let old = self.load_le(addr, T::BYTES)?;
        let new: WordType = data.into();
        self.raw_slice_mut(addr, T::BYTES)?
            .copy_from_slice(&new.to_le_bytes()[..T::BYTES]);
        self.on_write.fire(&MemoryWrite {
            addr,
            new,
            old,
            width: T::BYTES,
        });
        Ok(())
    }

    pub fn read_u8(&mut self, addr: WordType) -> Result<u8, MemError> {
        self.read(addr)
    }

    pub fn read_u16(&mut self, addr: WordType) -> Result<u16, MemError> {
        self.read(addr)
    }

    pub fn read_u32(&mut self, addr: WordType) -> Result<u32, MemError> {
        self.read(addr)
    }

    pub fn read_u64(&mut self, addr: WordType) -> Result<u64, MemError> {
        self.read(addr)
    }

    pub fn write_u8(&mut self, addr: WordType, data: u8) -> Result<(), MemError> {
        self.write(addr, data)
    }

    pub fn write_u16(&mut self, addr: WordType, data: u16) -> Result<(), MemError> {
        self.write(addr, data)
    }

    pub fn write_u32(&mut self, addr: WordType, data: u32) -> Result<(), MemError> {
        self.write(addr, data)
    }

    pub fn write_u64(&mut self, addr: WordType, data: u64) -> Result<(), MemError> {
        self.write(addr, data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_little_endian_access() {
        let mut mem = MemoryImage::new(0x1000);
        mem.allocate(0x100, 0x10).unwrap();

        mem.raw_slice_mut(0x100, 8)
            .unwrap()
            .copy_from_slice(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);

        assert_eq!(mem.read_u8(0x100), Ok(0x12));
        assert_eq!(mem.read_u16(0x100), Ok(0x3412));
        assert_eq!(mem.read_u32(0x100), Ok(0x78563412));
        assert_eq!(mem.read_u64(0x100), Ok(0xF0DEBC9A78563412));

        mem.write_u32(0x108, 0x12345678).unwrap();
        assert_eq!(mem.raw_slice(0x108, 4).unwrap(), &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(mem.fetch_u32(0x108), Ok(0x12345678));
    }

    #[test]
    fn test_bounds_on_both_edges() {
        let mut mem = MemoryImage::new(0x1000);
        mem.allocate(0x100, 0x10).unwrap();

        assert_eq!(mem.read_u8(0xFF), Err(MemError::OutOfBounds(0xFF)));
        assert_eq!(mem.read_u8(0x10F), Ok(0));
        assert_eq!(mem.read_u8(0x110), Err(MemError::OutOfBounds(0x110)));
        assert_eq!(mem.read_u64(0x108), Ok(0));
        assert_eq!(mem.read_u64(0x109), Err(MemError::OutOfBounds(0x109)));
        assert_eq!(mem.write_u16(0x10F, 1), Err(MemError::OutOfBounds(0x10F)));
        assert!(mem.contains(0x100));
        assert!(!mem.contains(0x110));
    }

    #[test]
    fn test_access_may_not_span_regions() {
        let mut mem = MemoryImage::new(0x1000);
        mem.allocate(0x100, 0x10).unwrap();
        mem.allocate(0x110, 0x10).unwrap();

        assert_eq!(mem.read_u32(0x10C), Ok(0));
        assert_eq!(mem.read_u32(0x10E), Err(MemError::OutOfBounds(0x10E)));
    }

    #[test]
    fn test_overlap_and_budget() {
        let mut mem = MemoryImage::new(0x100);
        mem.allocate(0x1000, 0x80).unwrap();

        assert_eq!(
            mem.allocate(0x1040, 0x10),
            Err(MemError::RegionOverlap {
                addr: 0x1040,
                size: 0x10
            })
        );
        assert_eq!(
            mem.allocate(0xFF0, 0x20),
            Err(MemError::RegionOverlap {
                addr: 0xFF0,
                size: 0x20
            })
        );
        assert_eq!(
            mem.allocate(0x2000, 0x81),
            Err(MemError::OutOfMemory { requested: 0x81 })
        );
        assert_eq!(mem.allocate(0x2000, 0), Ok(()));
        assert_eq!(mem.allocate(0x2000, 0x80), Ok(()));
        assert_eq!(mem.used(), 0x100);
        assert_eq!(
            mem.allocate(0x3000, 1),
            Err(MemError::OutOfMemory { requested: 1 })
        );

        assert_eq!(mem.release(0x2000), Ok(0x80));
        assert_eq!(mem.allocate(0x3000, 1), Ok(()));
    }

    #[test]
    fn test_unbounded_arena() {
        let mut mem = MemoryImage::new(WordType::MAX);
        mem.allocate(0x1000, 0x1000).unwrap();

        // within the budget, but no host can back it
        let huge = WordType::MAX - 0x2000;
        assert_eq!(
            mem.allocate(0x2000, huge),
            Err(MemError::OutOfMemory { requested: huge })
        );
        assert_eq!(
            mem.resize(0x1000, WordType::MAX - 0x1000),
            Err(MemError::OutOfMemory {
                requested: WordType::MAX - 0x2000
            })
        );
        assert_eq!(mem.used(), 0x1000);
        assert_eq!(mem.regions().count(), 1);
        assert_eq!(mem.read_u8(0x1FFF), Ok(0));
    }

    #[test]
    fn test_resize() {
        let mut mem = MemoryImage::new(0x1000);
        mem.allocate(0x100, 0x10).unwrap();
        mem.allocate(0x200, 0x10).unwrap();
        mem.write_u8(0x10F, 0xAA).unwrap();

        mem.resize(0x100, 0x100).unwrap();
        assert_eq!(mem.read_u8(0x10F), Ok(0xAA));
        assert_eq!(mem.read_u8(0x1FF), Ok(0));
        assert_eq!(
            mem.resize(0x100, 0x101),
            Err(MemError::RegionOverlap {
                addr: 0x100,
                size: 0x101
            })
        );
        assert_eq!(mem.used(), 0x110);
    }

    #[test]
    fn test_events() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut mem = MemoryImage::new(0x1000);

        {
            let log = log.clone();
            mem.on_allocate
                .subscribe(move |e| log.lock().unwrap().push(format!("alloc {:#x} {:#x}", e.addr, e.size)));
        }
        {
            let log = log.clone();
            mem.on_read
                .subscribe(move |e| log.lock().unwrap().push(format!("read {:#x} {:#x} {}", e.addr, e.value, e.width)));
        }
        {
            let log = log.clone();
            mem.on_write.subscribe(move |e| {
                log.lock()
                    .unwrap()
                    .push(format!("write {:#x} {:#x} {:#x} {}", e.addr, e.new, e.old, e.width))
            });
        }

        mem.allocate(0x100, 0x10).unwrap();
        mem.write_u16(0x100, 0xBEEF).unwrap();
        mem.write_u16(0x100, 0x1234).unwrap();
        mem.read_u8(0x101).unwrap();
        mem.fetch_u32(0x100).unwrap();
        mem.poke::<u8>(0x102, 1).unwrap();
        assert_eq!(mem.peek::<u32>(0x100), Ok(0x0001_1234));
        assert!(mem.read_u8(0x200).is_err());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "alloc 0x100 0x10",
                "write 0x100 0xbeef 0x0 2",
                "write 0x100 0x1234 0xbeef 2",
                "read 0x101 0x12 1",
            ]
        );
    }
}
