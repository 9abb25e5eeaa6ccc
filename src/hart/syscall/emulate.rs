use std::{
    ffi::CString,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::RngCore;

use crate::{
    config::{arch_config::WordType, mem_config::PAGE_SIZE},
    hart::{
        bootstrap::grow_heap,
        state::{HartState, names},
        syscall::{Outcome, Sysno, SyscallBridge, errno},
    },
    mem::MemError,
    utils::align_up,
};

const MAP_FIXED: u64 = 0x10;
const MAP_ANONYMOUS: u64 = 0x20;

const CLOCK_REALTIME: u64 = 0;

const S_IFCHR: u32 = 0o020000;
const STAT_SIZE: usize = 128;
const STAT_MODE_OFFSET: usize = 16;
const STAT_BLKSIZE_OFFSET: usize = 56;

const UTSNAME_FIELD_LEN: usize = 65;
const UTSNAME: [&str; 6] = ["Linux", "hartsim", "6.1.0", "#1 SMP", "riscv64", ""];

const MAX_PATH: usize = 4096;

fn fault_to_errno(result: Result<i64, MemError>) -> i64 {
    result.unwrap_or(-errno::EFAULT)
}

impl SyscallBridge {
    /// Run `sysno` in the simulator. `None` if it is not emulated here.
    pub(super) fn try_emulate(
        &mut self,
        sysno: Sysno,
        args: [u64; 6],
        hs: &mut HartState,
    ) -> Option<Outcome> {
        let ret = match sysno {
            Sysno::Exit | Sysno::ExitGroup => {
                hs.set_exit_code(args[0] as i32);
                return Some(Outcome::NoReturn);
            }
            Sysno::Read => fault_to_errno(self.sys_read(hs, args)),
            Sysno::Write => fault_to_errno(self.sys_write(hs, args)),
            Sysno::Writev => fault_to_errno(self.sys_writev(hs, args)),
            Sysno::Openat => fault_to_errno(self.sys_openat(hs, args)),
            Sysno::Fstat => fault_to_errno(sys_fstat(hs, args)),
            Sysno::Brk => sys_brk(hs, args[0]) as i64,
            Sysno::Mmap => self.sys_mmap(hs, args),
            Sysno::Munmap => self.sys_munmap(hs, args[0], args[1]),
            Sysno::SetTidAddress => 1,
            Sysno::Uname => fault_to_errno(sys_uname(hs, args[0])),
            Sysno::ClockGettime => fault_to_errno(self.sys_clock_gettime(hs, args)),
            Sysno::Ioctl => -errno::ENOTTY,
            Sysno::RtSigaction | Sysno::RtSigprocmask => 0,
            Sysno::Getrandom => fault_to_errno(self.sys_getrandom(hs, args)),
            _ => return None,
        };

        Some(Outcome::Return(ret))
    }

    fn sys_mmap(&mut self, hs: &mut HartState, args: [u64; 6]) -> i64 {
        let (addr, len, flags) = (args[0], args[1], args[3]);

        if len == 0 || flags & MAP_ANONYMOUS == 0 {
            return -errno::EINVAL;
        }
        let Some(size) = align_up(len, PAGE_SIZE) else {
            return -errno::ENOMEM;
        };

        let fixed = flags & MAP_FIXED != 0;
        let target = if fixed {
            addr
        } else {
            match hs.named_address(names::MMAP_NEXT) {
                Some(next) => next,
                None => return -errno::ENOMEM,
            }
        };

        match hs.mem_mut().allocate(target, size) {
            Ok(()) => {
                if !fixed {
                    hs.set_named_address(names::MMAP_NEXT, target + size);
                }
                self.mappings.insert(target, size);
                target as i64
            }
            Err(MemError::RegionOverlap { .. }) if fixed => -errno::EINVAL,
            Err(_) => -errno::ENOMEM,
        }
    }

    /// Only a whole mapping made by `mmap` can be released.
    fn sys_munmap(&mut self, hs: &mut HartState, addr: WordType, len: u64) -> i64 {
        let whole = align_up(len, PAGE_SIZE)
            .is_some_and(|size| self.mappings.get(&addr) == Some(&size));
        if len == 0 || !whole {
            return -errno::EINVAL;
        }

        self.mappings.remove(&addr);
        match hs.mem_mut().release(addr) {
            Ok(_) => 0,
            Err(_) => -errno::EINVAL,
        }
    }

    fn sys_read(&mut self, hs: &mut HartState, args: [u64; 6]) -> Result<i64, MemError> {
        let buf = hs.mem_mut().raw_slice_mut(args[1], args[2] as usize)?;
        Ok(self.host.read(args[0] as i32, buf))
    }

    fn sys_write(&mut self, hs: &mut HartState, args: [u64; 6]) -> Result<i64, MemError> {
        let buf = hs.mem().raw_slice(args[1], args[2] as usize)?;
        Ok(self.host.write(args[0] as i32, buf))
    }

    fn sys_writev(&mut self, hs: &mut HartState, args: [u64; 6]) -> Result<i64, MemError> {
        let (fd, iov, iovcnt) = (args[0] as i32, args[1], args[2]);
        let mut total = 0i64;

        for i in 0..iovcnt {
            let entry = iov + i * 16;
            let base: WordType = hs.mem().peek(entry)?;
            let len: WordType = hs.mem().peek(entry + 8)?;

            let ret = self.host.write(fd, hs.mem().raw_slice(base, len as usize)?);
            if ret < 0 {
                return Ok(if total == 0 { ret } else { total });
            }
            total += ret;
            if (ret as u64) < len {
                break;
            }
        }

        Ok(total)
    }

    fn sys_openat(&mut self, hs: &mut HartState, args: [u64; 6]) -> Result<i64, MemError> {
        let mut path = Vec::new();
        for offset in 0..MAX_PATH as u64 {
            match hs.mem().peek::<u8>(args[1] + offset)? {
                0 => break,
                byte => path.push(byte),
            }
        }

        let Ok(path) = CString::new(path) else {
            return Ok(-errno::EINVAL);
        };
        Ok(self
            .host
            .openat(args[0] as i32, &path, args[2] as i32, args[3] as u32))
    }

    fn sys_clock_gettime(&mut self, hs: &mut HartState, args: [u64; 6]) -> Result<i64, MemError> {
        let elapsed = if args[0] == CLOCK_REALTIME {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
        } else {
            self.clock_origin.elapsed()
        };

        hs.mem_mut().poke::<u64>(args[1], elapsed.as_secs())?;
        hs.mem_mut()
            .poke::<u64>(args[1] + 8, elapsed.subsec_nanos() as u64)?;
        Ok(0)
    }

    fn sys_getrandom(&mut self, hs: &mut HartState, args: [u64; 6]) -> Result<i64, MemError> {
        let buf = hs.mem_mut().raw_slice_mut(args[0], args[1] as usize)?;
        self.rng.fill_bytes(buf);
        Ok(args[1] as i64)
    }
}

fn sys_fstat(hs: &mut HartState, args: [u64; 6]) -> Result<i64, MemError> {
    if args[0] > 2 {
        return Ok(-errno::EBADF);
    }

    let stat = hs.mem_mut().raw_slice_mut(args[1], STAT_SIZE)?;
    stat.fill(0);
    stat[STAT_MODE_OFFSET..STAT_MODE_OFFSET + 4].copy_from_slice(&(S_IFCHR | 0o620).to_le_bytes());
    stat[STAT_BLKSIZE_OFFSET..STAT_BLKSIZE_OFFSET + 4].copy_from_slice(&1024i32.to_le_bytes());
    Ok(0)
}

/// Returns the new break, or the old one when the request cannot be met.
fn sys_brk(hs: &mut HartState, requested: WordType) -> WordType {
    let (Some(start), Some(end)) = (
        hs.named_address(names::HEAP_START),
        hs.named_address(names::HEAP_END),
    ) else {
        return 0;
    };

    if requested < start {
        return end;
    }

    match grow_heap(hs, requested) {
        Ok(()) => requested,
        Err(err) => {
            log::debug!("brk to {:#x} failed: {}", requested, err);
            end
        }
    }
}

fn sys_uname(hs: &mut HartState, buf: WordType) -> Result<i64, MemError> {
    let out = hs
        .mem_mut()
        .raw_slice_mut(buf, UTSNAME_FIELD_LEN * UTSNAME.len())?;
    out.fill(0);
    for (field, value) in out.chunks_mut(UTSNAME_FIELD_LEN).zip(UTSNAME) {
        field[..value.len()].copy_from_slice(value.as_bytes());
    }
    Ok(0)
}
