pub mod attribute;
pub mod dimension;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::num::NonZeroU32;

use thiserror::Error;

#[cfg(any(test, feature = "proptest-strategies"))]
use proptest::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use attribute::AttributeData;
pub use dimension::{DimensionConstraints, DimensionData};

/// The kind of query which an array is opened for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Mode {
    Read,
    Write,
}

/// Whether every coordinate of the domain holds a cell, or only the
/// coordinates which were explicitly written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum ArrayType {
    Dense,
    Sparse,
}

#[cfg(any(test, feature = "proptest-strategies"))]
impl Arbitrary for ArrayType {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![Just(ArrayType::Dense), Just(ArrayType::Sparse)].boxed()
    }
}

/// The order of tiles within a fragment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum TileOrder {
    RowMajor,
    ColumnMajor,
}

#[cfg(any(test, feature = "proptest-strategies"))]
impl Arbitrary for TileOrder {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![Just(TileOrder::RowMajor), Just(TileOrder::ColumnMajor)]
            .boxed()
    }
}

/// The order of cells within a tile, and the order in which a query
/// produces its results.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum CellOrder {
    Unordered,
    RowMajor,
    ColumnMajor,
    Global,
}

#[cfg(any(test, feature = "proptest-strategies"))]
impl Arbitrary for CellOrder {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(CellOrder::Unordered),
            Just(CellOrder::RowMajor),
            Just(CellOrder::ColumnMajor),
            Just(CellOrder::Global)
        ]
        .boxed()
    }
}

/// The number of values in a cell of an attribute.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum CellValNum {
    /// The number of values per cell is a specific fixed number.
    Fixed(NonZeroU32),
    /// The number of values per cell varies.
    Var,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CellValNumError {
    #[error("Cell val num cannot be zero")]
    Zero,
}

impl CellValNum {
    pub fn single() -> Self {
        CellValNum::Fixed(NonZeroU32::new(1).unwrap())
    }

    pub fn is_var_sized(&self) -> bool {
        matches!(self, CellValNum::Var)
    }

    pub fn is_single_valued(&self) -> bool {
        matches!(self, CellValNum::Fixed(cvn) if cvn.get() == 1)
    }

    pub fn fixed(&self) -> Option<NonZeroU32> {
        if let CellValNum::Fixed(cvn) = self {
            Some(*cvn)
        } else {
            None
        }
    }
}

impl Default for CellValNum {
    fn default() -> Self {
        Self::single()
    }
}

impl Display for CellValNum {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            CellValNum::Fixed(cvn) => write!(f, "{cvn}"),
            CellValNum::Var => write!(f, "var"),
        }
    }
}

impl TryFrom<u32> for CellValNum {
    type Error = CellValNumError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match NonZeroU32::new(value) {
            Some(value) => Ok(CellValNum::Fixed(value)),
            None => Err(CellValNumError::Zero),
        }
    }
}

impl From<CellValNum> for u32 {
    fn from(value: CellValNum) -> Self {
        match value {
            CellValNum::Fixed(cvn) => cvn.get(),
            CellValNum::Var => u32::MAX,
        }
    }
}
