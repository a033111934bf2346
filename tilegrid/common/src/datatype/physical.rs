use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use crate::private::sealed;

/// Trait for comparisons based on value bits.
/// This exists to work around float `NaN` which is not equal to itself,
/// preventing float types from being `Eq` for generic operations.
pub trait BitsEq {
    /// Test if two values have the same bits.
    ///
    /// This is often the same as `PartialEq::eq`, but is not in the case
    /// of floats where `NaN != NaN`.
    fn bits_eq(&self, other: &Self) -> bool;

    fn bits_ne(&self, other: &Self) -> bool {
        !self.bits_eq(other)
    }
}

impl<T> BitsEq for &T
where
    T: BitsEq,
{
    fn bits_eq(&self, other: &Self) -> bool {
        (**self).bits_eq(*other)
    }
}

impl<T> BitsEq for [T]
where
    T: BitsEq,
{
    fn bits_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(l, r)| l.bits_eq(r))
    }
}

impl<T> BitsEq for Vec<T>
where
    T: BitsEq,
{
    fn bits_eq(&self, other: &Self) -> bool {
        self.as_slice().bits_eq(other.as_slice())
    }
}

/// Trait for ordering based on value bits.
/// This exists to work around float `NaN` which prevents float from being
/// a total order for use with generic operations.
pub trait BitsOrd {
    /// Return the ordering between `self` and `other`.
    /// This function defines a total order for all values of `Self`.
    fn bits_cmp(&self, other: &Self) -> Ordering;

    /// Returns `true` if `self` is less than `other` by `self.bits_cmp`.
    fn bits_lt(&self, other: &Self) -> bool {
        matches!(self.bits_cmp(other), Ordering::Less)
    }

    /// Returns `true` if `self` is less than or equal to `other`
    /// by `self.bits_cmp`.
    fn bits_le(&self, other: &Self) -> bool {
        matches!(self.bits_cmp(other), Ordering::Less | Ordering::Equal)
    }

    /// Returns `true` if `self` is greater than or equal to `other`
    /// by `self.bits_cmp`.
    fn bits_ge(&self, other: &Self) -> bool {
        matches!(self.bits_cmp(other), Ordering::Equal | Ordering::Greater)
    }

    /// Returns `true` if `self` is greater than `other` by `self.bits_cmp`.
    fn bits_gt(&self, other: &Self) -> bool {
        matches!(self.bits_cmp(other), Ordering::Greater)
    }
}

impl<T> BitsOrd for &T
where
    T: BitsOrd,
{
    fn bits_cmp(&self, other: &Self) -> Ordering {
        (**self).bits_cmp(*other)
    }
}

/// Implements lexicographic comparison of slices using the `BitsOrd` trait
/// of the element.
impl<T> BitsOrd for [T]
where
    T: BitsOrd,
{
    fn bits_cmp(&self, other: &Self) -> Ordering {
        for (l, r) in self.iter().zip(other.iter()) {
            match l.bits_cmp(r) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.len().cmp(&other.len())
    }
}

impl<T> BitsOrd for Vec<T>
where
    T: BitsOrd,
{
    fn bits_cmp(&self, other: &Self) -> Ordering {
        self.as_slice().bits_cmp(other.as_slice())
    }
}

/// Trait for hashing based on value bits.
/// This exists so that hashing is consistent with `BitsEq`.
pub trait BitsHash {
    fn bits_hash<H>(&self, state: &mut H)
    where
        H: Hasher;
}

impl<T> BitsHash for &T
where
    T: BitsHash,
{
    fn bits_hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        (**self).bits_hash(state)
    }
}

impl<T> BitsHash for [T]
where
    T: BitsHash,
{
    fn bits_hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        for value in self.iter() {
            value.bits_hash(state)
        }
    }
}

impl<T> BitsHash for Vec<T>
where
    T: BitsHash,
{
    fn bits_hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.as_slice().bits_hash(state)
    }
}

/// Trait for the physical representation of a cell value.
///
/// Values move between typed code and byte-addressed tiles and buffers
/// through `read_le`/`write_le`, always in little-endian order.
pub trait PhysicalType:
    BitsEq
    + BitsOrd
    + BitsHash
    + Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + crate::private::Sealed
    + 'static
{
    const SIZE: usize;

    /// Reads a value from the first `Self::SIZE` bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` holds fewer than `Self::SIZE` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Appends the little-endian bytes of `self` to `out`.
    fn write_le(&self, out: &mut Vec<u8>);
}

macro_rules! integral_type_impls {
    ($($T:ty: $N:literal),+) => {
        sealed!($($T),+);

        $(
            impl BitsEq for $T {
                fn bits_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }

            impl BitsOrd for $T {
                fn bits_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }

            impl BitsHash for $T {
                fn bits_hash<H>(&self, state: &mut H) where H: Hasher {
                    self.hash(state)
                }
            }

            impl PhysicalType for $T {
                const SIZE: usize = $N;

                fn read_le(bytes: &[u8]) -> Self {
                    let mut le = [0u8; $N];
                    le.copy_from_slice(&bytes[..$N]);
                    <$T>::from_le_bytes(le)
                }

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes())
                }
            }
        )+
    }
}

integral_type_impls!(u8: 1, u16: 2, u32: 4, u64: 8);
integral_type_impls!(i8: 1, i16: 2, i32: 4, i64: 8);

macro_rules! float_type_impls {
    ($($T:ty: $N:literal),+) => {
        sealed!($($T),+);

        $(
            /// The difference from the `PartialEq` implementation is
            /// that of `NaN`, which is `bits_eq` to itself.
            impl BitsEq for $T {
                fn bits_eq(&self, other: &Self) -> bool {
                    self.to_bits() == other.to_bits()
                }
            }

            impl BitsOrd for $T {
                fn bits_cmp(&self, other: &Self) -> Ordering {
                    self.total_cmp(other)
                }
            }

            impl BitsHash for $T {
                fn bits_hash<H>(&self, state: &mut H) where H: Hasher {
                    self.to_bits().hash(state)
                }
            }

            impl PhysicalType for $T {
                const SIZE: usize = $N;

                fn read_le(bytes: &[u8]) -> Self {
                    let mut le = [0u8; $N];
                    le.copy_from_slice(&bytes[..$N]);
                    <$T>::from_le_bytes(le)
                }

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes())
                }
            }
        )+
    }
}

float_type_impls!(f32: 4, f64: 8);

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn roundtrip_i64(value in any::<i64>()) {
            let mut bytes = Vec::new();
            value.write_le(&mut bytes);
            assert_eq!(bytes.len(), i64::SIZE);
            assert_eq!(value, i64::read_le(&bytes));
        }

        #[test]
        fn roundtrip_f64(value in any::<f64>()) {
            let mut bytes = Vec::new();
            value.write_le(&mut bytes);
            assert!(value.bits_eq(&f64::read_le(&bytes)));
        }
    }

    #[test]
    fn float_nan_total_order() {
        assert!(f64::NAN.bits_eq(&f64::NAN));
        assert_eq!(Ordering::Equal, f64::NAN.bits_cmp(&f64::NAN));
        assert!(1.0f64.bits_lt(&f64::NAN));
        assert!(f64::NEG_INFINITY.bits_lt(&f64::INFINITY));
    }
}
