#![cfg(test)]
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::{
    config::arch_config::{REGFILE_CNT, WordType},
    hart::{executor::Executor, state::HartState, syscall::SyscallBridge},
    isa::{DECODER, RVInstrInfo, RiscvInstr},
    mem::MemoryImage,
    utils::{UnsignedInteger, sign_extend},
};

pub(crate) const PROGRAM_BASE: WordType = 0x1000;
pub(crate) const DATA_BASE: WordType = 0x10_0000;
pub(crate) const DATA_SIZE: WordType = 0x1000;

/// A memory image with `program` mapped at `base` and nothing else.
pub(crate) fn image_with_program(base: WordType, program: &[u32]) -> MemoryImage {
    let mut mem = MemoryImage::default();
    mem.allocate(base, 4 * program.len().max(1) as WordType)
        .unwrap();
    for (i, word) in program.iter().enumerate() {
        mem.poke(base + 4 * i as WordType, *word).unwrap();
    }
    mem
}

pub(crate) struct TestHartBuilder {
    base: WordType,
    pc: Option<WordType>,
    region_size: Option<WordType>,
    program: Vec<u32>,
    regs: Vec<(u8, WordType)>,
    mem: Vec<(WordType, WordType, usize)>,
}

impl TestHartBuilder {
    pub(crate) fn new() -> Self {
        Self {
            base: PROGRAM_BASE,
            pc: None,
            region_size: None,
            program: Vec::new(),
            regs: Vec::new(),
            mem: Vec::new(),
        }
    }

    /// Where the program region is mapped. Also the initial pc unless [`Self::pc`] is given.
    pub(crate) fn base(mut self, base: WordType) -> Self {
        self.base = base;
        self
    }

    pub(crate) fn pc(mut self, value: WordType) -> Self {
        self.pc = Some(value);
        self
    }

    pub(crate) fn region_size(mut self, size: WordType) -> Self {
        self.region_size = Some(size);
        self
    }

    pub(crate) fn reg(mut self, idx: u8, value: WordType) -> Self {
        self.regs.push((idx, value));
        self
    }

    /// Store `value` in the data region at `DATA_BASE + offset`.
    pub(crate) fn mem<T: UnsignedInteger>(mut self, offset: WordType, value: T) -> Self {
        self.mem.push((DATA_BASE + offset, value.into(), T::BYTES));
        self
    }

    pub(crate) fn program(mut self, instrs: &[u32]) -> Self {
        self.program = instrs.to_vec();
        self
    }

    pub(crate) fn build(self) -> (Executor, HartState) {
        let program_size = 4 * self.program.len().max(1) as WordType;
        let mut mem = MemoryImage::default();
        mem.allocate(self.base, self.region_size.unwrap_or(program_size.max(0x100)))
            .unwrap();
        mem.allocate(DATA_BASE, DATA_SIZE).unwrap();

        for (i, word) in self.program.iter().enumerate() {
            mem.poke(self.base + 4 * i as WordType, *word).unwrap();
        }
        for (addr, value, width) in self.mem {
            match width {
                1 => mem.poke(addr, value as u8),
                2 => mem.poke(addr, value as u16),
                4 => mem.poke(addr, value as u32),
                _ => mem.poke(addr, value),
            }
            .unwrap();
        }

        let mut hs = HartState::new(mem, self.pc.unwrap_or(self.base));
        for (idx, value) in self.regs {
            hs.rf_mut().set_raw(idx, value);
        }

        (Executor::new(SyscallBridge::unsupported()), hs)
    }
}

pub(crate) struct HartChecker<'a> {
    pub(crate) hs: &'a mut HartState,
}

impl<'a> HartChecker<'a> {
    pub(crate) fn new(hs: &'a mut HartState) -> Self {
        Self { hs }.reg(0, 0)
    }

    pub(crate) fn reg(self, idx: u8, value: WordType) -> Self {
        assert_eq!(self.hs.rf().raw(idx), value, "Register #{} incorrect", idx);
        self
    }

    pub(crate) fn pc(self, value: WordType) -> Self {
        assert_eq!(self.hs.pc.read(), value, "PC incorrect");
        self
    }

    pub(crate) fn prev_pc(self, value: WordType) -> Self {
        assert_eq!(self.hs.pc.previous(), value, "previous PC incorrect");
        self
    }

    /// Check the data region at `DATA_BASE + offset`.
    pub(crate) fn mem<T: UnsignedInteger>(self, offset: WordType, value: WordType) -> Self {
        assert_eq!(
            self.hs.mem().peek::<T>(DATA_BASE + offset).unwrap().into(),
            value,
            "Memory value incorrect at offset {:#x}",
            offset
        );
        self
    }
}

pub(crate) fn run_test_exec<F, G>(instr: RiscvInstr, info: RVInstrInfo, build: F, check: G)
where
    F: FnOnce(TestHartBuilder) -> TestHartBuilder,
    G: FnOnce(HartChecker) -> HartChecker,
{
    let (_, mut hs) = build(TestHartBuilder::new()).build();
    let desc = DECODER
        .entries()
        .iter()
        .find(|desc| desc.instr == instr)
        .unwrap();
    (desc.exec)(info, &mut hs).unwrap();
    check(HartChecker::new(&mut hs));
}

pub(crate) fn run_test_step<F, G>(raw_instrs: &[u32], build: F, check: G)
where
    F: FnOnce(TestHartBuilder) -> TestHartBuilder,
    G: FnOnce(HartChecker) -> HartChecker,
{
    let (mut executor, mut hs) = build(TestHartBuilder::new()).program(raw_instrs).build();
    for _ in 0..raw_instrs.len() {
        executor.step(&mut hs).unwrap();
    }
    check(HartChecker::new(&mut hs));
}

pub(crate) struct ExecTester {
    rng: ChaCha12Rng,
}

impl ExecTester {
    pub(crate) fn new() -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(0721),
        }
    }

    pub(crate) fn rand_imm12(&mut self) -> WordType {
        self.rng.random_range(0..=4095) as WordType
    }

    pub(crate) fn rand_word(&mut self) -> WordType {
        self.rng.random_range(0..=WordType::MAX)
    }

    pub(crate) fn rand_word2(&mut self) -> (WordType, WordType) {
        (self.rand_word(), self.rand_word())
    }

    pub(crate) fn rand_reg_idx(&mut self) -> u8 {
        self.rng.random_range(1..REGFILE_CNT) as u8
    }

    pub(crate) fn rand_reg_idx2(&mut self) -> (u8, u8) {
        (self.rand_reg_idx(), self.rand_reg_idx())
    }

    pub(crate) fn rand_unique_reg_idx2(&mut self) -> (u8, u8) {
        let idx1 = self.rand_reg_idx();
        let mut idx2 = self.rand_reg_idx();
        while idx1 == idx2 {
            idx2 = self.rand_reg_idx();
        }
        (idx1, idx2)
    }

    pub(crate) fn test_rand_r_with(
        &mut self,
        instr: RiscvInstr,
        lhs: WordType,
        rhs: WordType,
        expected: WordType,
    ) {
        let rd = self.rand_reg_idx();
        let (rs1, rs2) = self.rand_unique_reg_idx2();
        let info = RVInstrInfo::R { rd, rs1, rs2 };

        run_test_exec(
            instr,
            info,
            |builder| builder.reg(rs1, lhs).reg(rs2, rhs),
            |checker| checker.reg(rd, expected).pc(PROGRAM_BASE + 4),
        );
    }

    pub(crate) fn test_rand_r<F>(&mut self, instr: RiscvInstr, calc: F)
    where
        F: FnOnce(WordType, WordType) -> WordType,
    {
        let (val1, val2) = self.rand_word2();
        self.test_rand_r_with(instr, val1, val2, calc(val1, val2));
    }

    pub(crate) fn test_rand_i_with(
        &mut self,
        instr: RiscvInstr,
        lhs: WordType,
        imm: WordType,
        expected: WordType,
    ) {
        let (rd, rs1) = self.rand_reg_idx2();
        let info = RVInstrInfo::I { rd, rs1, imm };

        run_test_exec(
            instr,
            info,
            |builder| builder.reg(rs1, lhs),
            |checker| checker.reg(rd, expected).pc(PROGRAM_BASE + 4),
        );
    }

    pub(crate) fn test_rand_i<F>(&mut self, instr: RiscvInstr, calc: F)
    where
        F: FnOnce(WordType, WordType) -> WordType,
    {
        let val = self.rand_word();
        let imm = self.rand_imm12();
        self.test_rand_i_with(instr, val, imm, calc(val, sign_extend(imm, 12)));
    }
}
