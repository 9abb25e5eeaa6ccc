use crate::config::arch_config::WordType;

/// A contiguous, zero-initialised block of guest memory.
pub struct MemRegion {
    base: WordType,
    data: Box<[u8]>,
}

impl MemRegion {
    /// `None` when the host cannot back `size` bytes.
    pub fn new(base: WordType, size: WordType) -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(usize::try_from(size).ok()?).ok()?;
        data.resize(size as usize, 0);
        Some(Self {
            base,
            data: data.into_boxed_slice(),
        })
    }

    pub fn base(&self) -> WordType {
        self.base
    }

    pub fn size(&self) -> WordType {
        self.data.len() as WordType
    }

    /// One past the last byte.
    pub fn end(&self) -> WordType {
        self.base + self.size()
    }

    /// Whether `[addr, addr + len)` lies entirely inside this region.
    pub fn covers(&self, addr: WordType, len: WordType) -> bool {
        addr >= self.base
            && addr
                .checked_add(len)
                .is_some_and(|access_end| access_end <= self.end())
    }

    pub fn bytes(&self, addr: WordType, len: usize) -> &[u8] {
        let offset = (addr - self.base) as usize;
        &self.data[offset..offset + len]
    }

    pub fn bytes_mut(&mut self, addr: WordType, len: usize) -> &mut [u8] {
        let offset = (addr - self.base) as usize;
        &mut self.data[offset..offset + len]
    }

    /// Grow or shrink in place, keeping the common prefix. On failure the
    /// region is left as it was.
    pub(super) fn resize(&mut self, new_size: WordType) -> Option<()> {
        let new_len = usize::try_from(new_size).ok()?;
        let mut data = std::mem::take(&mut self.data).into_vec();
        if new_len > data.len() && data.try_reserve_exact(new_len - data.len()).is_err() {
            self.data = data.into_boxed_slice();
            return None;
        }
        data.resize(new_len, 0);
        self.data = data.into_boxed_slice();
        Some(())
    }
}

impl std::fmt::Debug for MemRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemRegion[{:#x}, {:#x})", self.base, self.end())
    }
}
