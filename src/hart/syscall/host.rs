use std::ffi::CStr;

use crate::hart::syscall::{Sysno, errno};

/// The host side of the syscall bridge.
///
/// `invoke` takes a host syscall number and host-side arguments; the provided
/// methods translate the buffer-carrying calls the emulation layer needs.
pub trait HostSyscall: Send {
    /// Host number for a guest syscall, or `None` when the host cannot run it.
    fn remap(&self, sysno: Sysno) -> Option<i64>;

    /// Returns the raw result, `-errno` on failure.
    fn invoke(&mut self, nr: i64, args: [u64; 6]) -> i64;

    fn read(&mut self, fd: i32, buf: &mut [u8]) -> i64 {
        match self.remap(Sysno::Read) {
            Some(nr) => self.invoke(
                nr,
                [fd as u64, buf.as_mut_ptr() as u64, buf.len() as u64, 0, 0, 0],
            ),
            None => -errno::ENOSYS,
        }
    }

    fn write(&mut self, fd: i32, buf: &[u8]) -> i64 {
        match self.remap(Sysno::Write) {
            Some(nr) => self.invoke(
                nr,
                [fd as u64, buf.as_ptr() as u64, buf.len() as u64, 0, 0, 0],
            ),
            None => -errno::ENOSYS,
        }
    }

    fn openat(&mut self, dirfd: i32, path: &CStr, flags: i32, mode: u32) -> i64 {
        match self.remap(Sysno::Openat) {
            Some(nr) => self.invoke(
                nr,
                [
                    dirfd as i64 as u64,
                    path.as_ptr() as u64,
                    flags as u64,
                    mode as u64,
                    0,
                    0,
                ],
            ),
            None => -errno::ENOSYS,
        }
    }
}

/// Runs syscalls on the host kernel through `libc::syscall`.
#[cfg(target_os = "linux")]
pub struct NativeHost;

#[cfg(target_os = "linux")]
impl HostSyscall for NativeHost {
    fn remap(&self, sysno: Sysno) -> Option<i64> {
        let nr = match sysno {
            Sysno::Read => libc::SYS_read,
            Sysno::Write => libc::SYS_write,
            Sysno::Openat => libc::SYS_openat,
            Sysno::Close => libc::SYS_close,
            Sysno::Lseek => libc::SYS_lseek,
            Sysno::Getpid => libc::SYS_getpid,
            Sysno::Getppid => libc::SYS_getppid,
            Sysno::Getuid => libc::SYS_getuid,
            Sysno::Geteuid => libc::SYS_geteuid,
            Sysno::Getgid => libc::SYS_getgid,
            Sysno::Getegid => libc::SYS_getegid,
            _ => return None,
        };
        Some(nr as i64)
    }

    fn invoke(&mut self, nr: i64, args: [u64; 6]) -> i64 {
        let ret = unsafe {
            libc::syscall(
                nr as libc::c_long,
                args[0],
                args[1],
                args[2],
                args[3],
                args[4],
                args[5],
            )
        };

        if ret == -1 {
            -(std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(errno::EINVAL as i32) as i64)
        } else {
            ret as i64
        }
    }
}

/// A host without a syscall interface: every passthrough is unimplemented.
pub struct UnsupportedHost;

impl HostSyscall for UnsupportedHost {
    fn remap(&self, _sysno: Sysno) -> Option<i64> {
        None
    }

    fn invoke(&mut self, _nr: i64, _args: [u64; 6]) -> i64 {
        -errno::ENOSYS
    }
}

/// The best host implementation for the current platform.
pub fn default_host() -> Box<dyn HostSyscall> {
    #[cfg(target_os = "linux")]
    {
        Box::new(NativeHost)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedHost)
    }
}
