use std::{
    fmt::{Debug, Display},
    ops::*,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::config::arch_config::{SignedWordType, WordType, XLEN};

/// Sign-extend the low `from_bits` bits of `value` to a full [`WordType`].
///
/// Prefer [`crate::isa::bits::sign_extend`] when the width is a constant.
pub fn sign_extend(value: WordType, from_bits: u32) -> WordType {
    debug_assert!(from_bits > 0 && from_bits <= XLEN as u32);
    let sign_bit = XLEN as u32 - from_bits;
    ((value << sign_bit) as SignedWordType >> sign_bit) as WordType
}

pub fn sign_extend_u32(value: u32) -> WordType {
    value as i32 as i64 as WordType
}

pub fn wrapping_add_as_signed(lhs: WordType, rhs: WordType) -> WordType {
    lhs.cast_signed()
        .wrapping_add(rhs.cast_signed())
        .cast_unsigned()
}

/// get the negative of given number of [`WordType`] in 2's complement.
pub fn negative_of(value: WordType) -> WordType {
    (!value).wrapping_add(1)
}

/// Lock a mutex, ignoring poisoning. A listener that panicked must not wedge the hart controls.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `None` if the rounded value does not fit in 64 bits.
pub fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    value.checked_next_multiple_of(align)
}

pub fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

// ========================================
//  gen_name_list ["a1", "a2", "a3", ... ]
// ========================================

/// # Examples
/// ```
/// assert_eq!(gen_name_list!("a"; 0, 5), ["a0", "a1", "a2", "a3", "a4", "a5"])
/// ```
#[macro_export]
macro_rules! gen_name_list {
    ($base:literal; $begin: literal, $end: literal) => {
        seq_macro::seq!(N in $begin..= $end {
            [ #(concat!($base, stringify!(N)),) *]
        })
    }
}

pub trait TruncateFrom<T>: Sized {
    fn truncate_from(value: T) -> Self;
}

pub trait TruncateTo<T>: Sized {
    fn truncate_to(self) -> T;
}

impl<T, U> TruncateTo<U> for T
where
    U: TruncateFrom<T>,
{
    #[inline]
    fn truncate_to(self) -> U {
        U::truncate_from(self)
    }
}

pub trait TruncateToBits<T>: Sized {
    fn truncate_to_bits(self, bits: u32) -> Self;
}

macro_rules! impl_truncate_from {
    ($from:ty => $($to:ty),*) => {
        $(
            impl TruncateFrom<$from> for $to {
                #[inline]
                fn truncate_from(val: $from) -> Self {
                    val as $to
                }
            }
        )*
    };
}

impl_truncate_from!(u8 => u8, u16, u32, u64);
impl_truncate_from!(u16 => u8, u16, u32, u64);
impl_truncate_from!(u32 => u8, u16, u32, u64);
impl_truncate_from!(u64 => u8, u16, u32, u64);

macro_rules! impl_truncate_to_bits {
    ($T:ty) => {
        impl TruncateToBits<$T> for $T {
            fn truncate_to_bits(self, bits: u32) -> Self {
                if bits >= <$T>::BITS {
                    self
                } else {
                    ((self as u64) & ((1u64.wrapping_shl(bits)) - 1)) as Self
                }
            }
        }
    };
}

impl_truncate_to_bits!(u8);
impl_truncate_to_bits!(u16);
impl_truncate_to_bits!(u32);
impl_truncate_to_bits!(u64);

/// Unsigned integer types a guest memory access can be performed with.
pub trait UnsignedInteger:
    Copy
    + Sized
    + From<u8>
    + Into<u64>
    + Default
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Not<Output = Self>
    + Shl<u32, Output = Self>
    + Shr<u32, Output = Self>
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + Debug
    + Display
    + std::fmt::LowerHex
    + TruncateFrom<WordType>
    + TruncateTo<u8>
{
    const MAX: Self;
    const MIN: Self;

    /// Width in bytes.
    const BYTES: usize;
}

macro_rules! impl_unsigned_integer {
    ($($T:ty),*) => {
        $(
            impl UnsignedInteger for $T {
                const MAX: $T = <$T>::MAX;
                const MIN: $T = <$T>::MIN;
                const BYTES: usize = size_of::<$T>();
            }
        )*
    };
}

impl_unsigned_integer!(u8, u16, u32, u64);
