//! Guest `ecall` handling: RISC-V Linux numbers in `a7`, arguments in `a0..a5`,
//! result back in `a0`.

mod emulate;
mod host;

use std::{collections::BTreeMap, time::Instant};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

use crate::{
    config::arch_config::WordType,
    hart::{fault::Fault, state::HartState},
};

pub use host::{HostSyscall, UnsupportedHost, default_host};

#[cfg(target_os = "linux")]
pub use host::NativeHost;

/// Linux errno values as the guest sees them.
pub mod errno {
    pub const EBADF: i64 = 9;
    pub const ENOMEM: i64 = 12;
    pub const EFAULT: i64 = 14;
    pub const EINVAL: i64 = 22;
    pub const ENOTTY: i64 = 25;
    pub const ENOSYS: i64 = 38;
}

const REG_A0: u8 = 10;
const REG_A7: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum Sysno {
    Ioctl = 29,
    Openat = 56,
    Close = 57,
    Lseek = 62,
    Read = 63,
    Write = 64,
    Writev = 66,
    Fstat = 80,
    Exit = 93,
    ExitGroup = 94,
    SetTidAddress = 96,
    ClockGettime = 113,
    RtSigaction = 134,
    RtSigprocmask = 135,
    Uname = 160,
    Getpid = 172,
    Getppid = 173,
    Getuid = 174,
    Geteuid = 175,
    Getgid = 176,
    Getegid = 177,
    Brk = 214,
    Munmap = 215,
    Mmap = 222,
    Getrandom = 278,
}

/// Calls forwarded to the host unchanged.
const PASSTHROUGH: &[Sysno] = &[
    Sysno::Close,
    Sysno::Lseek,
    Sysno::Getpid,
    Sysno::Getppid,
    Sysno::Getuid,
    Sysno::Geteuid,
    Sysno::Getgid,
    Sysno::Getegid,
];

/// What an emulation routine leaves in `a0`.
pub(crate) enum Outcome {
    Return(i64),
    /// The call does not return to the guest (`exit`).
    NoReturn,
}

pub struct SyscallBridge {
    host: Box<dyn HostSyscall>,
    rng: ChaCha12Rng,
    clock_origin: Instant,
    /// Anonymous mappings handed out by `mmap`, base to size.
    mappings: BTreeMap<WordType, WordType>,
}

impl SyscallBridge {
    pub fn new(host: Box<dyn HostSyscall>, seed: u64) -> Self {
        Self {
            host,
            rng: ChaCha12Rng::seed_from_u64(seed),
            clock_origin: Instant::now(),
            mappings: BTreeMap::new(),
        }
    }

    /// Bridge backed by [`default_host`].
    pub fn native(seed: u64) -> Self {
        Self::new(default_host(), seed)
    }

    /// Bridge that only serves emulated calls.
    pub fn unsupported() -> Self {
        Self::new(Box::new(UnsupportedHost), 0)
    }

    pub fn emulate(&mut self, hs: &mut HartState) -> Result<(), Fault> {
        let nr = hs.rf().raw(REG_A7);
        let args: [u64; 6] = std::array::from_fn(|i| hs.rf().raw(REG_A0 + i as u8));

        let Ok(sysno) = Sysno::try_from(nr) else {
            log::error!("unknown syscall {} args={:x?}", nr, args);
            return Err(Fault::SyscallUnimplemented(nr));
        };

        let outcome = match self.try_emulate(sysno, args, hs) {
            Some(outcome) => outcome,
            None => self.passthrough(sysno, args)?,
        };

        match outcome {
            Outcome::Return(ret) => {
                log::debug!("syscall {:?}[{}] args={:x?} = {:#x}", sysno, nr, args, ret);
                hs.write_gpr(REG_A0, ret as u64);
            }
            Outcome::NoReturn => {
                log::debug!("syscall {:?}[{}] args={:x?} does not return", sysno, nr, args);
            }
        }

        Ok(())
    }

    fn passthrough(&mut self, sysno: Sysno, args: [u64; 6]) -> Result<Outcome, Fault> {
        let host_nr = PASSTHROUGH
            .contains(&sysno)
            .then(|| self.host.remap(sysno))
            .flatten()
            .ok_or(Fault::SyscallUnimplemented(sysno.into()))?;

        Ok(Outcome::Return(self.host.invoke(host_nr, args)))
    }
}
