#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::array::CellValNum;
use crate::datatype::Datatype;
use crate::filter::CompressionData;

/// The description of a named, typed field stored per cell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct AttributeData {
    pub name: String,
    pub datatype: Datatype,
    pub cell_val_num: CellValNum,
    pub compression: Option<CompressionData>,
}

impl AttributeData {
    pub fn new<S>(name: S, datatype: Datatype) -> Self
    where
        S: Into<String>,
    {
        AttributeData {
            name: name.into(),
            datatype,
            cell_val_num: CellValNum::single(),
            compression: None,
        }
    }

    pub fn with_cell_val_num(self, cell_val_num: CellValNum) -> Self {
        AttributeData {
            cell_val_num,
            ..self
        }
    }

    /// Marks cells of this attribute as variable-length.
    pub fn var_sized(self) -> Self {
        self.with_cell_val_num(CellValNum::Var)
    }

    pub fn with_compression(self, compression: CompressionData) -> Self {
        AttributeData {
            compression: Some(compression),
            ..self
        }
    }

    pub fn is_var_sized(&self) -> bool {
        self.cell_val_num.is_var_sized()
    }

    /// Returns the size in bytes of one cell of this attribute,
    /// or `None` if cells are variable-length.
    pub fn cell_size(&self) -> Option<u64> {
        self.cell_val_num
            .fixed()
            .map(|cvn| cvn.get() as u64 * self.datatype.size() as u64)
    }
}
