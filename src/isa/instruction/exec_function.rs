use crate::{
    config::arch_config::WordType,
    hart::{
        fault::Fault,
        state::{HartState, Trap},
    },
    isa::{
        bits::sign_extend,
        instruction::{RVInstrInfo, normal_exec},
    },
    utils::{self, TruncateFrom, UnsignedInteger, sign_extend_u32, wrapping_add_as_signed},
};

/// ExecTrait will generate operation result to `exec_xxx` function.
/// ExecTrait::exec only do calculate.
/// `exec_xxx` function interact with the hart state.
pub(crate) trait ExecTrait<T> {
    fn exec(a: WordType, b: WordType) -> T;
}

/// Process arithmetic instructions with `rs1`, (`rs2` or `imm`) and `rd`.
///
/// This will always do signed extension to `imm` as 12 bit.
pub(crate) fn exec_arith<F>(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault>
where
    F: ExecTrait<WordType>,
{
    normal_exec(hs, |hs| {
        let (rd, rst) = match info {
            RVInstrInfo::R { rs1, rs2, rd } => {
                let val1 = hs.read_gpr(rs1);
                let val2 = hs.read_gpr(rs2);
                (rd, F::exec(val1, val2))
            }
            RVInstrInfo::I { rs1, rd, imm } => {
                let val1 = hs.read_gpr(rs1);
                (rd, F::exec(val1, sign_extend::<12>(imm)))
            }
            _ => std::unreachable!(),
        };

        hs.write_gpr(rd, rst);
        Ok(())
    })
}

/// Shift by an immediate held in the I-type immediate, masked to `SHAMT_MASK`.
pub(crate) fn exec_shift_imm<F, const SHAMT_MASK: WordType>(
    info: RVInstrInfo,
    hs: &mut HartState,
) -> Result<(), Fault>
where
    F: ExecTrait<WordType>,
{
    normal_exec(hs, |hs| {
        if let RVInstrInfo::I { rs1, rd, imm } = info {
            let val = hs.read_gpr(rs1);
            hs.write_gpr(rd, F::exec(val, imm & SHAMT_MASK));
        } else {
            std::unreachable!();
        }
        Ok(())
    })
}

/// Shift by an immediate held in the `rs2` field (`SLLIW`, `SRLIW`, `SRAIW`).
pub(crate) fn exec_shift_imm_w<F>(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault>
where
    F: ExecTrait<WordType>,
{
    normal_exec(hs, |hs| {
        if let RVInstrInfo::R { rs1, rs2: shamt, rd } = info {
            let val = hs.read_gpr(rs1);
            hs.write_gpr(rd, F::exec(val, shamt as WordType));
        } else {
            std::unreachable!();
        }
        Ok(())
    })
}

pub(crate) fn exec_branch<F>(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault>
where
    F: ExecTrait<bool>,
{
    if let RVInstrInfo::B { rs1, rs2, imm } = info {
        let val1 = hs.read_gpr(rs1);
        let val2 = hs.read_gpr(rs2);
        let pc = hs.pc.read();

        if F::exec(val1, val2) {
            hs.pc.write(pc.wrapping_add(sign_extend::<13>(imm)));
        } else {
            hs.pc.write(pc.wrapping_add(4));
        }
    } else {
        std::unreachable!();
    }

    Ok(())
}

pub(crate) fn exec_load<T, const EXTEND: bool>(
    info: RVInstrInfo,
    hs: &mut HartState,
) -> Result<(), Fault>
where
    T: UnsignedInteger,
{
    normal_exec(hs, |hs| {
        if let RVInstrInfo::I { rs1, rd, imm } = info {
            let base = hs.read_gpr(rs1);
            let addr = wrapping_add_as_signed(base, sign_extend::<12>(imm));
            let data: u64 = hs.mem_mut().read::<T>(addr)?.into();

            let data = if EXTEND {
                utils::sign_extend(data, (T::BYTES * 8) as u32)
            } else {
                data
            };
            hs.write_gpr(rd, data);
        } else {
            std::unreachable!();
        }
        Ok(())
    })
}

pub(crate) fn exec_store<T>(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault>
where
    T: UnsignedInteger,
{
    normal_exec(hs, |hs| {
        if let RVInstrInfo::S { rs1, rs2, imm } = info {
            let base = hs.read_gpr(rs1);
            let data = hs.read_gpr(rs2);
            let addr = wrapping_add_as_signed(base, sign_extend::<12>(imm));

            hs.mem_mut().write(addr, T::truncate_from(data))?;
        } else {
            std::unreachable!();
        }
        Ok(())
    })
}

pub(crate) fn exec_lui(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault> {
    normal_exec(hs, |hs| {
        if let RVInstrInfo::U { rd, imm } = info {
            hs.write_gpr(rd, sign_extend::<32>(imm));
        } else {
            std::unreachable!();
        }
        Ok(())
    })
}

pub(crate) fn exec_auipc(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault> {
    normal_exec(hs, |hs| {
        if let RVInstrInfo::U { rd, imm } = info {
            let pc = hs.pc.read();
            hs.write_gpr(rd, pc.wrapping_add(sign_extend::<32>(imm)));
        } else {
            std::unreachable!();
        }
        Ok(())
    })
}

pub(crate) fn exec_jal(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault> {
    if let RVInstrInfo::J { rd, imm } = info {
        let pc = hs.pc.read();
        let target = pc.wrapping_add(sign_extend::<21>(imm));

        hs.write_gpr(rd, pc.wrapping_add(4));
        hs.pc.write(target);
    } else {
        std::unreachable!();
    }

    Ok(())
}

pub(crate) fn exec_jalr(info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault> {
    if let RVInstrInfo::I { rs1, rd, imm } = info {
        let pc = hs.pc.read();
        // rs1 must be read before rd is written, they may be the same register.
        let base = hs.read_gpr(rs1);
        let target = wrapping_add_as_signed(base, sign_extend::<12>(imm)) & !1;

        hs.write_gpr(rd, pc.wrapping_add(4));
        hs.pc.write(target);
    } else {
        std::unreachable!();
    }

    Ok(())
}

// We are executing in order, so fences have nothing to do.
pub(crate) fn exec_nop(_info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault> {
    normal_exec(hs, |_| Ok(()))
}

pub(crate) fn exec_ecall(_info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault> {
    normal_exec(hs, |hs| {
        hs.raise(Trap::EnvCall);
        Ok(())
    })
}

pub(crate) fn exec_ebreak(_info: RVInstrInfo, hs: &mut HartState) -> Result<(), Fault> {
    normal_exec(hs, |hs| {
        hs.raise(Trap::Breakpoint);
        Ok(())
    })
}

// =============================================
//                  ExecTrait
// =============================================
// Arith
pub(crate) struct ExecAdd {}
impl ExecTrait<WordType> for ExecAdd {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_add(b)
    }
}

pub(crate) struct ExecSub {}
impl ExecTrait<WordType> for ExecSub {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_sub(b)
    }
}

pub(crate) struct ExecMulLow {}
impl ExecTrait<WordType> for ExecMulLow {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_mul(b)
    }
}

pub(crate) struct ExecMulHighUnsigned {}
impl ExecTrait<WordType> for ExecMulHighUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        ((a as u128).wrapping_mul(b as u128) >> 64) as WordType
    }
}

pub(crate) struct ExecMulHighSigned {}
impl ExecTrait<WordType> for ExecMulHighSigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        let a = a as i64 as i128;
        let b = b as i64 as i128;
        (a.wrapping_mul(b) >> 64) as WordType
    }
}

pub(crate) struct ExecMulHighSignedUnsigned {}
impl ExecTrait<WordType> for ExecMulHighSignedUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        let high = ExecMulHighUnsigned::exec(a, b);

        if a.cast_signed() < 0 {
            // Let M = 1 << XLEN, given a *negative* integer `a` bewteen [-M/2, 0).
            // Then a * b = (a + M) * b - M * b.
            // Here, a + M equals to the unsigned reinterpretation of `a`.
            high.wrapping_sub(b)
        } else {
            high
        }
    }
}

pub(crate) struct ExecDivSigned {}
impl ExecTrait<WordType> for ExecDivSigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return WordType::MAX;
        }
        a.cast_signed().wrapping_div(b.cast_signed()) as WordType
    }
}

pub(crate) struct ExecDivUnsigned {}
impl ExecTrait<WordType> for ExecDivUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return WordType::MAX;
        }
        a / b
    }
}

pub(crate) struct ExecRemSigned {}
impl ExecTrait<WordType> for ExecRemSigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return a;
        }
        a.cast_signed().wrapping_rem(b.cast_signed()) as WordType
    }
}

pub(crate) struct ExecRemUnsigned {}
impl ExecTrait<WordType> for ExecRemUnsigned {
    fn exec(a: WordType, b: WordType) -> WordType {
        if b == 0 {
            return a;
        }
        a % b
    }
}

// Arith word
pub(crate) struct ExecAddw {}
impl ExecTrait<WordType> for ExecAddw {
    fn exec(a: WordType, b: WordType) -> WordType {
        sign_extend_u32((a as u32).wrapping_add(b as u32))
    }
}

pub(crate) struct ExecSubw {}
impl ExecTrait<WordType> for ExecSubw {
    fn exec(a: WordType, b: WordType) -> WordType {
        sign_extend_u32((a as u32).wrapping_sub(b as u32))
    }
}

pub(crate) struct ExecMulw {}
impl ExecTrait<WordType> for ExecMulw {
    fn exec(a: WordType, b: WordType) -> WordType {
        sign_extend_u32((a as u32).wrapping_mul(b as u32))
    }
}

pub(crate) struct ExecDivw {}
impl ExecTrait<WordType> for ExecDivw {
    fn exec(a: WordType, b: WordType) -> WordType {
        let [sa, sb] = [a, b].map(|x| u32::truncate_from(x).cast_signed());
        if sb == 0 {
            return WordType::MAX;
        }
        sign_extend_u32(sa.wrapping_div(sb).cast_unsigned())
    }
}

pub(crate) struct ExecDivuw {}
impl ExecTrait<WordType> for ExecDivuw {
    fn exec(a: WordType, b: WordType) -> WordType {
        let [ua, ub] = [a, b].map(u32::truncate_from);
        if ub == 0 {
            return WordType::MAX;
        }
        sign_extend_u32(ua / ub)
    }
}

pub(crate) struct ExecRemw {}
impl ExecTrait<WordType> for ExecRemw {
    fn exec(a: WordType, b: WordType) -> WordType {
        let [sa, sb] = [a, b].map(|x| u32::truncate_from(x).cast_signed());
        if sb == 0 {
            return sign_extend_u32(sa.cast_unsigned());
        }
        sign_extend_u32(sa.wrapping_rem(sb).cast_unsigned())
    }
}

pub(crate) struct ExecRemuw {}
impl ExecTrait<WordType> for ExecRemuw {
    fn exec(a: WordType, b: WordType) -> WordType {
        let [ua, ub] = [a, b].map(u32::truncate_from);
        if ub == 0 {
            return sign_extend_u32(ua);
        }
        sign_extend_u32(ua % ub)
    }
}

// Shift
pub(crate) struct ExecSLL {}
impl ExecTrait<WordType> for ExecSLL {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_shl(b as u32)
    }
}

pub(crate) struct ExecSRL {}
impl ExecTrait<WordType> for ExecSRL {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.wrapping_shr(b as u32)
    }
}

pub(crate) struct ExecSRA {}
impl ExecTrait<WordType> for ExecSRA {
    fn exec(a: WordType, b: WordType) -> WordType {
        a.cast_signed().wrapping_shr(b as u32).cast_unsigned()
    }
}

pub(crate) struct ExecSLLW {}
impl ExecTrait<WordType> for ExecSLLW {
    fn exec(a: WordType, b: WordType) -> WordType {
        sign_extend_u32((a as u32).wrapping_shl(b as u32))
    }
}

pub(crate) struct ExecSRLW {}
impl ExecTrait<WordType> for ExecSRLW {
    fn exec(a: WordType, b: WordType) -> WordType {
        sign_extend_u32((a as u32).wrapping_shr(b as u32))
    }
}

pub(crate) struct ExecSRAW {}
impl ExecTrait<WordType> for ExecSRAW {
    fn exec(a: WordType, b: WordType) -> WordType {
        sign_extend_u32((a as u32).cast_signed().wrapping_shr(b as u32).cast_unsigned())
    }
}

// Bit
pub(crate) struct ExecAnd {}
impl ExecTrait<WordType> for ExecAnd {
    fn exec(a: WordType, b: WordType) -> WordType {
        a & b
    }
}

pub(crate) struct ExecOr {}
impl ExecTrait<WordType> for ExecOr {
    fn exec(a: WordType, b: WordType) -> WordType {
        a | b
    }
}

pub(crate) struct ExecXor {}
impl ExecTrait<WordType> for ExecXor {
    fn exec(a: WordType, b: WordType) -> WordType {
        a ^ b
    }
}

// Compare
pub(crate) struct ExecSignedLess {}
impl ExecTrait<bool> for ExecSignedLess {
    fn exec(a: WordType, b: WordType) -> bool {
        a.cast_signed() < b.cast_signed()
    }
}
impl ExecTrait<WordType> for ExecSignedLess {
    fn exec(a: WordType, b: WordType) -> WordType {
        (a.cast_signed() < b.cast_signed()) as WordType
    }
}

pub(crate) struct ExecUnsignedLess {}
impl ExecTrait<bool> for ExecUnsignedLess {
    fn exec(a: WordType, b: WordType) -> bool {
        a < b
    }
}
impl ExecTrait<WordType> for ExecUnsignedLess {
    fn exec(a: WordType, b: WordType) -> WordType {
        (a < b) as WordType
    }
}

pub(crate) struct ExecEqual {}
impl ExecTrait<bool> for ExecEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        a == b
    }
}

pub(crate) struct ExecNotEqual {}
impl ExecTrait<bool> for ExecNotEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        a != b
    }
}

pub(crate) struct ExecSignedGreatEqual {}
impl ExecTrait<bool> for ExecSignedGreatEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        a.cast_signed() >= b.cast_signed()
    }
}

pub(crate) struct ExecUnsignedGreatEqual {}
impl ExecTrait<bool> for ExecUnsignedGreatEqual {
    fn exec(a: WordType, b: WordType) -> bool {
        a >= b
    }
}
