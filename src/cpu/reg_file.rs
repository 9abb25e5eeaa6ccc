use std::fmt::Debug;

use crate::{
    config::arch_config::{REG_NAME, REG_NUMERIC_NAME, REGFILE_CNT, WordType, XLEN},
    cpu::register::{Register, RegisterClass},
};

pub const GPR_CLASS: &str = "GPR";

pub struct RegFile {
    gpr: RegisterClass,
}

impl Debug for RegFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex_width = size_of::<WordType>() * 2;

        writeln!(f, "reg_file {{")?;
        for (i, reg) in self.gpr.iter().enumerate() {
            if i % 8 == 0 {
                write!(f, "  ")?;
            }

            write!(
                f,
                "{:>6}: 0x{:0width$x}  ",
                REG_NAME[i],
                reg.get(),
                width = hex_width
            )?;

            if i % 8 == 7 {
                writeln!(f)?;
            }
        }

        if self.gpr.len() % 8 != 0 {
            writeln!(f)?;
        }

        write!(f, "}}")
    }
}

impl RegFile {
    /// 32 integer registers, `x0` hardwired to zero.
    pub fn new() -> Self {
        let regs = (0..REGFILE_CNT)
            .map(|i| Register::new(REG_NUMERIC_NAME[i], XLEN as u32, i == 0))
            .collect();

        Self {
            gpr: RegisterClass::new(GPR_CLASS, regs),
        }
    }

    pub fn gpr(&self) -> &RegisterClass {
        &self.gpr
    }

    pub fn gpr_mut(&mut self) -> &mut RegisterClass {
        &mut self.gpr
    }

    pub fn class(&self, name: &str) -> Option<&RegisterClass> {
        (name == GPR_CLASS).then_some(&self.gpr)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut RegisterClass> {
        (name == GPR_CLASS).then_some(&mut self.gpr)
    }

    #[inline]
    pub fn read(&mut self, idx: u8) -> WordType {
        self.gpr.read(idx)
    }

    #[inline]
    pub fn write(&mut self, idx: u8, data: WordType) {
        self.gpr.write(idx, data)
    }

    pub fn raw(&self, idx: u8) -> WordType {
        self.gpr.raw(idx)
    }

    pub fn set_raw(&mut self, idx: u8, data: WordType) {
        self.gpr.set_raw(idx, data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::event::{RegisterRead, RegisterWrite};

    use super::*;

    #[test]
    fn test_hardwired_zero() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let reads = Arc::new(Mutex::new(Vec::new()));

        let mut rf = RegFile::new();
        {
            let writes = writes.clone();
            rf.gpr_mut()
                .on_write
                .subscribe(move |e: &RegisterWrite| writes.lock().unwrap().push(*e));
            let reads = reads.clone();
            rf.gpr_mut()
                .on_read
                .subscribe(move |e: &RegisterRead| reads.lock().unwrap().push(*e));
        }

        rf.write(0, 0xDEAD);
        assert_eq!(rf.read(0), 0);
        rf.write(5, 42);
        assert_eq!(rf.read(5), 42);

        assert_eq!(
            *writes.lock().unwrap(),
            vec![
                RegisterWrite {
                    class: "GPR",
                    index: 0,
                    new: 0xDEAD,
                    old: 0
                },
                RegisterWrite {
                    class: "GPR",
                    index: 5,
                    new: 42,
                    old: 0
                },
            ]
        );
        assert_eq!(reads.lock().unwrap().len(), 2);
        assert_eq!(reads.lock().unwrap()[0].value, 0);
    }

    #[test]
    fn test_raw_access_is_silent() {
        let count = Arc::new(Mutex::new(0));
        let mut rf = RegFile::new();
        {
            let count = count.clone();
            rf.gpr_mut()
                .on_write
                .subscribe(move |_| *count.lock().unwrap() += 1);
        }

        rf.set_raw(2, 0x8000);
        rf.set_raw(0, 1);
        assert_eq!(rf.raw(2), 0x8000);
        assert_eq!(rf.raw(0), 0);
        assert_eq!(*count.lock().unwrap(), 0);
        assert!(rf.class("GPR").is_some());
        assert!(rf.class("FPR").is_none());
    }

    #[test]
    fn test_debug_format() {
        let mut rf = RegFile::new();
        rf.set_raw(10, 0xAB);
        let dump = format!("{rf:?}");
        assert!(dump.starts_with("reg_file {"));
        assert!(dump.contains("a0: 0x00000000000000ab"));
    }
}
