#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The compression codec applied to the tiles of an attribute.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum CompressionType {
    Lz4,
    Gzip,
    Zstd,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct CompressionData {
    pub kind: CompressionType,
    pub level: Option<i32>,
}

impl CompressionData {
    pub fn new(kind: CompressionType) -> Self {
        CompressionData { kind, level: None }
    }
}
