use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;

use num_traits::FromPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::datatype::physical::{BitsEq, BitsHash, BitsOrd};
use crate::datatype::{Datatype, Error as DatatypeError};

/// The coordinate box enclosing a tile's cells, one closed interval
/// per dimension.
pub type MinimumBoundingRectangle = Vec<SingleValueRange>;

macro_rules! check_datatype_inner {
    ($ty:ty, $dtype:expr) => {{
        let datatype = $dtype;
        if !datatype.is_compatible_type::<$ty>() {
            return Err(DatatypeError::physical_type_incompatible::<$ty>(
                datatype,
            ));
        }
    }};
}

macro_rules! check_datatype {
    ($self:expr, $datatype:expr) => {
        match $self {
            Self::UInt8(_, _) => check_datatype_inner!(u8, $datatype),
            Self::UInt16(_, _) => check_datatype_inner!(u16, $datatype),
            Self::UInt32(_, _) => check_datatype_inner!(u32, $datatype),
            Self::UInt64(_, _) => check_datatype_inner!(u64, $datatype),
            Self::Int8(_, _) => check_datatype_inner!(i8, $datatype),
            Self::Int16(_, _) => check_datatype_inner!(i16, $datatype),
            Self::Int32(_, _) => check_datatype_inner!(i32, $datatype),
            Self::Int64(_, _) => check_datatype_inner!(i64, $datatype),
            Self::Float32(_, _) => check_datatype_inner!(f32, $datatype),
            Self::Float64(_, _) => check_datatype_inner!(f64, $datatype),
        }
    };
}

fn intersection<'a, B>(
    left_lower: &'a B,
    left_upper: &'a B,
    right_lower: &'a B,
    right_upper: &'a B,
) -> Option<(&'a B, &'a B)>
where
    B: BitsOrd + ?Sized,
{
    // input integrity check
    assert!(left_lower.bits_le(left_upper));
    assert!(right_lower.bits_le(right_upper));

    if left_upper.bits_lt(right_lower) || right_upper.bits_lt(left_lower) {
        return None;
    }

    let lower = if left_lower.bits_lt(right_lower) {
        right_lower
    } else {
        left_lower
    };

    let upper = if left_upper.bits_gt(right_upper) {
        right_upper
    } else {
        left_upper
    };

    // output integrity check
    assert!(lower.bits_le(upper));

    Some((lower, upper))
}

/// A closed interval `[lo, hi]` of coordinates on one dimension.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum SingleValueRange {
    UInt8(u8, u8),
    UInt16(u16, u16),
    UInt32(u32, u32),
    UInt64(u64, u64),
    Int8(i8, i8),
    Int16(i16, i16),
    Int32(i32, i32),
    Int64(i64, i64),
    Float32(f32, f32),
    Float64(f64, f64),
}

impl SingleValueRange {
    /// Returns the number of cells spanned by this range if it is a
    /// range over a discrete domain.
    /// ```
    /// use tilegrid_common::range::SingleValueRange;
    /// assert_eq!(Some(100), SingleValueRange::Int64(1, 100).num_cells());
    /// assert_eq!(None, SingleValueRange::Float64(1.0, 100.0).num_cells());
    /// ```
    pub fn num_cells(&self) -> Option<u128> {
        let (low, high) = crate::single_value_range_go!(self, _DT : Integral, start, end,
            (i128::from(*start), i128::from(*end)),
            return None
        );
        Some(1 + (high - low) as u128)
    }

    pub fn is_integral(&self) -> bool {
        !matches!(self, Self::Float32(_, _) | Self::Float64(_, _))
    }

    /// Returns whether this range selects exactly one coordinate,
    /// i.e. whether its bounds have identical bits.
    pub fn is_point(&self) -> bool {
        crate::single_value_range_go!(self, _DT, start, end, {
            start.bits_eq(end)
        })
    }

    pub fn datatype(&self) -> Datatype {
        match self {
            Self::UInt8(_, _) => Datatype::UInt8,
            Self::UInt16(_, _) => Datatype::UInt16,
            Self::UInt32(_, _) => Datatype::UInt32,
            Self::UInt64(_, _) => Datatype::UInt64,
            Self::Int8(_, _) => Datatype::Int8,
            Self::Int16(_, _) => Datatype::Int16,
            Self::Int32(_, _) => Datatype::Int32,
            Self::Int64(_, _) => Datatype::Int64,
            Self::Float32(_, _) => Datatype::Float32,
            Self::Float64(_, _) => Datatype::Float64,
        }
    }

    pub fn check_datatype(
        &self,
        datatype: Datatype,
    ) -> Result<(), DatatypeError> {
        check_datatype!(self, datatype);
        Ok(())
    }

    /// Returns whether `other` is fully contained in `self`.
    ///
    /// # Panics
    ///
    /// Panics if `self` and `other` do not have the same physical datatype.
    pub fn contains_range(&self, other: &Self) -> bool {
        crate::single_value_range_cmp!(
            self,
            other,
            _DT,
            lstart,
            lend,
            rstart,
            rend,
            lstart.bits_le(rstart) && rend.bits_le(lend),
            {
                panic!(
                    "`SingleValueRange::contains_range` on non-matching datatypes: `self` = {:?}, `other` = {:?}",
                    self, other
                )
            }
        )
    }

    /// Returns the range covered by the union of `self` and `other`.
    ///
    /// # Panics
    ///
    /// Panics if `self` and `other` do not have the same physical datatype.
    pub fn union(&self, other: &Self) -> Self {
        crate::single_value_range_cmp!(
            self,
            other,
            DT,
            lstart,
            lend,
            rstart,
            rend,
            {
                let cmp = |l: &DT, r: &DT| l.bits_cmp(r);
                let min = std::cmp::min_by(*lstart, *rstart, cmp);
                let max = std::cmp::max_by(*lend, *rend, cmp);
                SingleValueRange::from(&[min, max])
            },
            {
                panic!(
                    "`SingleValueRange::union` on non-matching datatypes: `self` = {:?}, `other` = {:?}",
                    self, other
                )
            }
        )
    }

    /// Returns the range covered by the intersection of `self` and `other`,
    /// or `None` if `self` and `other` do not overlap.
    ///
    /// # Panics
    ///
    /// Panics if `self` and `other` do not have the same physical datatype.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        crate::single_value_range_cmp!(
            self,
            other,
            DT,
            lstart,
            lend,
            rstart,
            rend,
            {
                let (lower, upper) =
                    intersection::<DT>(lstart, lend, rstart, rend)?;
                Some(SingleValueRange::from(&[*lower, *upper]))
            },
            {
                panic!(
                    "`SingleValueRange::intersection` on non-matching datatypes: `self` = {:?}, `other` = {:?}",
                    self, other
                )
            }
        )
    }
}

impl PartialEq for SingleValueRange {
    fn eq(&self, other: &Self) -> bool {
        crate::single_value_range_cmp!(
            self,
            other,
            _DT,
            lstart,
            lend,
            rstart,
            rend,
            lstart.bits_eq(rstart) && lend.bits_eq(rend),
            false
        )
    }
}

/// The [PartialEq] implementation of [SingleValueRange] compares the
/// floating-point variants using [BitsEq],
/// and as such is an equivalence relation.
impl Eq for SingleValueRange {}

/// Uses the [BitsHash] implementation of the wrapped values.
impl Hash for SingleValueRange {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        crate::single_value_range_go!(self, _DT, start, end, {
            start.bits_hash(state);
            end.bits_hash(state);
        })
    }
}

macro_rules! single_value_range_from {
    ($($V:ident : $U:ty),+) => {
        $(
            impl From<&[$U; 2]> for SingleValueRange {
                fn from(value: &[$U; 2]) -> SingleValueRange {
                    SingleValueRange::$V(value[0], value[1])
                }
            }

            impl From<RangeInclusive<$U>> for SingleValueRange {
                fn from(value: RangeInclusive<$U>) -> SingleValueRange {
                    SingleValueRange::$V(*value.start(), *value.end())
                }
            }
        )+
    }
}

single_value_range_from!(UInt8: u8, UInt16: u16, UInt32: u32, UInt64: u64);
single_value_range_from!(Int8: i8, Int16: i16, Int32: i32, Int64: i64);
single_value_range_from!(Float32: f32, Float64: f64);

impl<T> TryFrom<SingleValueRange> for RangeInclusive<T>
where
    T: FromPrimitive,
{
    type Error = SingleValueRange;

    fn try_from(value: SingleValueRange) -> Result<Self, Self::Error> {
        crate::single_value_range_go!(value.clone(), _DT, lower, upper, {
            let lower = match lower.to_from_primitive() {
                Some(lower) => lower,
                None => return Err(value),
            };
            let upper = match upper.to_from_primitive() {
                Some(upper) => upper,
                None => return Err(value),
            };
            Ok(lower..=upper)
        })
    }
}

/// Conversion support for `TryFrom<SingleValueRange> for RangeInclusive<T>`;
/// maps each physical type onto its `FromPrimitive` constructor.
trait ToFromPrimitive {
    fn to_from_primitive<T: FromPrimitive>(&self) -> Option<T>;
}

macro_rules! to_from_primitive {
    ($($U:ty : $method:ident),+) => {
        $(
            impl ToFromPrimitive for $U {
                fn to_from_primitive<T: FromPrimitive>(&self) -> Option<T> {
                    T::$method(*self)
                }
            }
        )+
    }
}

to_from_primitive!(u8: from_u8, u16: from_u16, u32: from_u32, u64: from_u64);
to_from_primitive!(i8: from_i8, i16: from_i16, i32: from_i32, i64: from_i64);
to_from_primitive!(f32: from_f32, f64: from_f64);

#[macro_export]
macro_rules! single_value_range_go {
    ($expr:expr, $DT:ident, $start:pat, $end:pat, $then:expr) => {{
        use $crate::range::SingleValueRange;
        match $expr {
            SingleValueRange::UInt8($start, $end) => {
                type $DT = u8;
                $then
            }
            SingleValueRange::UInt16($start, $end) => {
                type $DT = u16;
                $then
            }
            SingleValueRange::UInt32($start, $end) => {
                type $DT = u32;
                $then
            }
            SingleValueRange::UInt64($start, $end) => {
                type $DT = u64;
                $then
            }
            SingleValueRange::Int8($start, $end) => {
                type $DT = i8;
                $then
            }
            SingleValueRange::Int16($start, $end) => {
                type $DT = i16;
                $then
            }
            SingleValueRange::Int32($start, $end) => {
                type $DT = i32;
                $then
            }
            SingleValueRange::Int64($start, $end) => {
                type $DT = i64;
                $then
            }
            SingleValueRange::Float32($start, $end) => {
                type $DT = f32;
                $then
            }
            SingleValueRange::Float64($start, $end) => {
                type $DT = f64;
                $then
            }
        }
    }};
    ($expr:expr, $DT:ident : Integral, $start:pat, $end:pat, $then:expr, $else:expr) => {{
        use $crate::range::SingleValueRange;
        match $expr {
            SingleValueRange::UInt8($start, $end) => {
                type $DT = u8;
                $then
            }
            SingleValueRange::UInt16($start, $end) => {
                type $DT = u16;
                $then
            }
            SingleValueRange::UInt32($start, $end) => {
                type $DT = u32;
                $then
            }
            SingleValueRange::UInt64($start, $end) => {
                type $DT = u64;
                $then
            }
            SingleValueRange::Int8($start, $end) => {
                type $DT = i8;
                $then
            }
            SingleValueRange::Int16($start, $end) => {
                type $DT = i16;
                $then
            }
            SingleValueRange::Int32($start, $end) => {
                type $DT = i32;
                $then
            }
            SingleValueRange::Int64($start, $end) => {
                type $DT = i64;
                $then
            }
            SingleValueRange::Float32(_, _) => {
                type $DT = f32;
                $else
            }
            SingleValueRange::Float64(_, _) => {
                type $DT = f64;
                $else
            }
        }
    }};
}

#[macro_export]
macro_rules! single_value_range_cmp {
    ($lexpr:expr, $rexpr:expr, $DT:ident, $lstart:pat, $lend:pat, $rstart:pat, $rend:pat, $then:expr, $else:expr) => {{
        use $crate::range::SingleValueRange;
        match ($lexpr, $rexpr) {
            (
                SingleValueRange::UInt8($lstart, $lend),
                SingleValueRange::UInt8($rstart, $rend),
            ) => {
                type $DT = u8;
                $then
            }
            (
                SingleValueRange::UInt16($lstart, $lend),
                SingleValueRange::UInt16($rstart, $rend),
            ) => {
                type $DT = u16;
                $then
            }
            (
                SingleValueRange::UInt32($lstart, $lend),
                SingleValueRange::UInt32($rstart, $rend),
            ) => {
                type $DT = u32;
                $then
            }
            (
                SingleValueRange::UInt64($lstart, $lend),
                SingleValueRange::UInt64($rstart, $rend),
            ) => {
                type $DT = u64;
                $then
            }
            (
                SingleValueRange::Int8($lstart, $lend),
                SingleValueRange::Int8($rstart, $rend),
            ) => {
                type $DT = i8;
                $then
            }
            (
                SingleValueRange::Int16($lstart, $lend),
                SingleValueRange::Int16($rstart, $rend),
            ) => {
                type $DT = i16;
                $then
            }
            (
                SingleValueRange::Int32($lstart, $lend),
                SingleValueRange::Int32($rstart, $rend),
            ) => {
                type $DT = i32;
                $then
            }
            (
                SingleValueRange::Int64($lstart, $lend),
                SingleValueRange::Int64($rstart, $rend),
            ) => {
                type $DT = i64;
                $then
            }
            (
                SingleValueRange::Float32($lstart, $lend),
                SingleValueRange::Float32($rstart, $rend),
            ) => {
                type $DT = f32;
                $then
            }
            (
                SingleValueRange::Float64($lstart, $lend),
                SingleValueRange::Float64($rstart, $rend),
            ) => {
                type $DT = f64;
                $then
            }
            _ => $else,
        }
    }};
}

#[cfg(any(test, feature = "proptest-strategies"))]
pub mod strategy {
    use proptest::prelude::*;

    use super::*;

    fn strat_for_datatype(datatype: Datatype) -> BoxedStrategy<SingleValueRange> {
        crate::physical_type_go!(datatype, DT, {
            (any::<DT>(), any::<DT>())
                .prop_map(|(a, b)| {
                    let (lo, hi) = if a.bits_le(&b) { (a, b) } else { (b, a) };
                    SingleValueRange::from(&[lo, hi])
                })
                .boxed()
        })
    }

    impl Arbitrary for SingleValueRange {
        type Parameters = Option<Datatype>;
        type Strategy = BoxedStrategy<SingleValueRange>;

        fn arbitrary_with(datatype: Self::Parameters) -> Self::Strategy {
            if let Some(datatype) = datatype {
                strat_for_datatype(datatype)
            } else {
                any::<Datatype>().prop_flat_map(strat_for_datatype).boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn num_cells() {
        assert_eq!(Some(1), SingleValueRange::UInt64(4, 4).num_cells());
        assert_eq!(Some(16), SingleValueRange::Int32(-7, 8).num_cells());
        assert_eq!(
            Some(u64::MAX as u128 + 1),
            SingleValueRange::UInt64(0, u64::MAX).num_cells()
        );
        assert_eq!(None, SingleValueRange::Float32(0.0, 0.0).num_cells());
    }

    #[test]
    fn is_point() {
        assert!(SingleValueRange::UInt64(3, 3).is_point());
        assert!(!SingleValueRange::UInt64(3, 4).is_point());
        assert!(SingleValueRange::Float64(1.5, 1.5).is_point());
        assert!(
            SingleValueRange::Float64(f64::NAN, f64::NAN).is_point(),
            "point-ness is a bits comparison"
        );
        assert!(!SingleValueRange::Float64(-0.0, 0.0).is_point());
    }

    fn do_intersection(left: SingleValueRange, right: SingleValueRange) {
        let output = left.intersection(&right);
        if let Some(output) = output {
            // the intersection lies within both inputs, and one of the
            // inputs supplies each bound
            assert!(left.contains_range(&output));
            assert!(right.contains_range(&output));
            assert!(!output.contains_range(&left) || left == output);
            assert!(!output.contains_range(&right) || right == output);
        } else {
            crate::single_value_range_cmp!(
                &left,
                &right,
                _DT,
                lstart,
                lend,
                rstart,
                rend,
                {
                    assert!(lstart.bits_le(lend));
                    assert!(rstart.bits_le(rend));
                    assert!(lend.bits_lt(rstart) || rend.bits_lt(lstart));
                },
                unreachable!()
            )
        }
    }

    fn strat_intersection()
    -> impl Strategy<Value = (SingleValueRange, SingleValueRange)> {
        any::<Datatype>().prop_flat_map(|dt| {
            (
                any_with::<SingleValueRange>(Some(dt)),
                any_with::<SingleValueRange>(Some(dt)),
            )
        })
    }

    proptest! {
        #[test]
        fn intersection((left, right) in strat_intersection()) {
            do_intersection(left, right)
        }

        #[test]
        fn union_contains((left, right) in strat_intersection()) {
            let union = left.union(&right);
            assert!(union.contains_range(&left));
            assert!(union.contains_range(&right));
        }
    }

    #[test]
    fn intersection_properties_exact() {
        let left = SingleValueRange::UInt64(1, 4);
        let right = SingleValueRange::UInt64(3, 9);
        assert_eq!(
            Some(SingleValueRange::UInt64(3, 4)),
            left.intersection(&right)
        );
        assert_eq!(SingleValueRange::UInt64(1, 9), left.union(&right));
        assert_eq!(
            None,
            SingleValueRange::UInt64(1, 2)
                .intersection(&SingleValueRange::UInt64(3, 4))
        );
    }
}
