pub mod physical;

pub use physical::{BitsEq, BitsHash, BitsOrd, PhysicalType};

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Physical type mismatch: expected {actual_type}, found {requested_type}")]
    PhysicalTypeMismatch {
        requested_type: &'static str,
        actual_type: &'static str,
    },
    #[error("Physical type '{physical_type}' is not compatible with datatype '{datatype}'")]
    PhysicalTypeIncompatible {
        physical_type: &'static str,
        datatype: Datatype,
    },
}

impl Error {
    pub fn physical_type_mismatch<T, U>() -> Self {
        Self::PhysicalTypeMismatch {
            requested_type: std::any::type_name::<T>(),
            actual_type: std::any::type_name::<U>(),
        }
    }

    pub fn physical_type_incompatible<T>(datatype: Datatype) -> Self {
        Self::PhysicalTypeIncompatible {
            physical_type: std::any::type_name::<T>(),
            datatype,
        }
    }
}

/// The type of a dimension domain or attribute cell.
///
/// `Char` is physically an `i8`; it exists so that character data prints
/// as text rather than numbers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Datatype {
    /// An 8-bit signed integer
    Int8,
    /// A 16-bit signed integer
    Int16,
    /// A 32-bit signed integer
    Int32,
    /// A 64-bit signed integer
    Int64,
    /// An 8-bit unsigned integer
    UInt8,
    /// A 16-bit unsigned integer
    UInt16,
    /// A 32-bit unsigned integer
    UInt32,
    /// A 64-bit unsigned integer
    UInt64,
    /// A 32-bit floating point value
    Float32,
    /// A 64-bit floating point value
    Float64,
    /// An 8-bit character value
    Char,
}

const DATATYPES: [Datatype; 11] = [
    Datatype::Int8,
    Datatype::Int16,
    Datatype::Int32,
    Datatype::Int64,
    Datatype::UInt8,
    Datatype::UInt16,
    Datatype::UInt32,
    Datatype::UInt64,
    Datatype::Float32,
    Datatype::Float64,
    Datatype::Char,
];

impl Datatype {
    /// Returns the size in bytes of one value of this datatype.
    pub fn size(&self) -> usize {
        crate::physical_type_go!(self, DT, std::mem::size_of::<DT>())
    }

    pub fn is_compatible_type<T: 'static>(&self) -> bool {
        use std::any::TypeId;

        let tid = TypeId::of::<T>();
        if tid == TypeId::of::<i8>() {
            matches!(*self, Datatype::Int8 | Datatype::Char)
        } else if tid == TypeId::of::<i16>() {
            matches!(*self, Datatype::Int16)
        } else if tid == TypeId::of::<i32>() {
            matches!(*self, Datatype::Int32)
        } else if tid == TypeId::of::<i64>() {
            matches!(*self, Datatype::Int64)
        } else if tid == TypeId::of::<u8>() {
            matches!(*self, Datatype::UInt8)
        } else if tid == TypeId::of::<u16>() {
            matches!(*self, Datatype::UInt16)
        } else if tid == TypeId::of::<u32>() {
            matches!(*self, Datatype::UInt32)
        } else if tid == TypeId::of::<u64>() {
            matches!(*self, Datatype::UInt64)
        } else if tid == TypeId::of::<f32>() {
            matches!(*self, Datatype::Float32)
        } else if tid == TypeId::of::<f64>() {
            matches!(*self, Datatype::Float64)
        } else {
            false
        }
    }

    /// Returns whether this type is an integral type (i.e. integer)
    pub fn is_integral_type(&self) -> bool {
        matches!(
            *self,
            Datatype::Int8
                | Datatype::Int16
                | Datatype::Int32
                | Datatype::Int64
                | Datatype::UInt8
                | Datatype::UInt16
                | Datatype::UInt32
                | Datatype::UInt64
                | Datatype::Char
        )
    }

    /// Returns whether this type is a real number (i.e. floating point)
    pub fn is_real_type(&self) -> bool {
        matches!(*self, Datatype::Float32 | Datatype::Float64)
    }

    /// Returns whether this type can be used as a dimension type
    /// of a sparse array
    pub fn is_allowed_dimension_type_sparse(&self) -> bool {
        !matches!(*self, Datatype::Char)
    }

    /// Returns whether this type can be used as a dimension type
    /// of a dense array
    pub fn is_allowed_dimension_type_dense(&self) -> bool {
        self.is_integral_type() && !matches!(*self, Datatype::Char)
    }

    pub fn same_physical_type(&self, other: &Datatype) -> bool {
        crate::physical_type_go!(self, MyPhysicalType, {
            crate::physical_type_go!(other, TheirPhysicalType, {
                std::any::TypeId::of::<MyPhysicalType>()
                    == std::any::TypeId::of::<TheirPhysicalType>()
            })
        })
    }

    /// Returns an `Iterator` which yields each variant of `Datatype`
    /// exactly once in an unspecified order.
    pub fn iter() -> impl Iterator<Item = Datatype> {
        DATATYPES.iter().copied()
    }
}

impl Display for Datatype {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Debug::fmt(self, f)
    }
}

impl FromStr for Datatype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        match s.as_ref() {
            "int8" => Ok(Datatype::Int8),
            "int16" => Ok(Datatype::Int16),
            "int32" => Ok(Datatype::Int32),
            "int64" => Ok(Datatype::Int64),
            "uint8" => Ok(Datatype::UInt8),
            "uint16" => Ok(Datatype::UInt16),
            "uint32" => Ok(Datatype::UInt32),
            "uint64" => Ok(Datatype::UInt64),
            "float32" => Ok(Datatype::Float32),
            "float64" => Ok(Datatype::Float64),
            "char" => Ok(Datatype::Char),
            _ => Err(s),
        }
    }
}

/// Apply a generic expression `$then` with a static type binding in the
/// identifier `$typename` for the physical type corresponding to the
/// dynamic `$datatype`.
///
/// This is the single dispatch point from a runtime `Datatype` to a
/// static physical type; all typed cell machinery funnels through it.
///
/// # Examples
///
/// ```
/// use tilegrid_common::physical_type_go;
/// use tilegrid_common::datatype::Datatype;
///
/// fn physical_type_to_str(datatype: Datatype) -> String {
///     physical_type_go!(datatype, DT, std::any::type_name::<DT>().to_owned())
/// }
///
/// assert_eq!("u8", physical_type_to_str(Datatype::UInt8));
/// assert_eq!("i8", physical_type_to_str(Datatype::Char));
/// assert_eq!("u64", physical_type_to_str(Datatype::UInt64));
/// ```
#[macro_export]
macro_rules! physical_type_go {
    ($datatype:expr, $typename:ident, $then:expr) => {{
        type Datatype = $crate::datatype::Datatype;
        match $datatype {
            Datatype::Int8 | Datatype::Char => {
                type $typename = i8;
                $then
            }
            Datatype::Int16 => {
                type $typename = i16;
                $then
            }
            Datatype::Int32 => {
                type $typename = i32;
                $then
            }
            Datatype::Int64 => {
                type $typename = i64;
                $then
            }
            Datatype::UInt8 => {
                type $typename = u8;
                $then
            }
            Datatype::UInt16 => {
                type $typename = u16;
                $then
            }
            Datatype::UInt32 => {
                type $typename = u32;
                $then
            }
            Datatype::UInt64 => {
                type $typename = u64;
                $then
            }
            Datatype::Float32 => {
                type $typename = f32;
                $then
            }
            Datatype::Float64 => {
                type $typename = f64;
                $then
            }
        }
    }};
}

#[cfg(any(test, feature = "proptest-strategies"))]
pub mod strategy;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn iter() {
        let mut yielded = HashSet::<Datatype>::new();
        for dt in Datatype::iter() {
            let prev = yielded.insert(dt);
            assert!(prev);
        }
    }

    #[test]
    fn compatible_type_is_unique() {
        for dt in Datatype::iter() {
            let mut count = 0;
            if dt.is_compatible_type::<i8>() {
                count += 1;
            }
            if dt.is_compatible_type::<i16>() {
                count += 1;
            }
            if dt.is_compatible_type::<i32>() {
                count += 1;
            }
            if dt.is_compatible_type::<i64>() {
                count += 1;
            }
            if dt.is_compatible_type::<u8>() {
                count += 1;
            }
            if dt.is_compatible_type::<u16>() {
                count += 1;
            }
            if dt.is_compatible_type::<u32>() {
                count += 1;
            }
            if dt.is_compatible_type::<u64>() {
                count += 1;
            }
            if dt.is_compatible_type::<f32>() {
                count += 1;
            }
            if dt.is_compatible_type::<f64>() {
                count += 1;
            }
            assert_eq!(1, count, "{dt}");
        }
    }

    proptest! {
        #[test]
        fn physical_type(dt in any::<Datatype>()) {
            physical_type_go!(dt, DT, {
                assert!(dt.is_compatible_type::<DT>());
                assert_eq!(dt.size(), std::mem::size_of::<DT>());
            })
        }
    }

    #[test]
    fn from_str() {
        for datatype in Datatype::iter() {
            let s_in = datatype.to_string();
            let s_out = Datatype::from_str(&s_in);

            assert_eq!(Ok(datatype), s_out);
        }
    }
}
