//! A tiled multi-dimensional array storage engine.
//!
//! Dense and sparse arrays are persisted as tiled, typed, optionally
//! compressed cell collections; typed read and write queries run
//! against rectangular subsets of the logical index space. Reads are
//! incremental: a submission fills the caller's bounded buffers and
//! reports [QueryStatus::Incomplete](tilegrid_common::query::QueryStatus)
//! until the selection is exhausted.

pub mod array;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod fragment;
pub mod pool;
pub mod query;
pub mod rtree;
pub mod storage;
pub mod subarray;

mod order;

pub use tilegrid_common::array::{
    ArrayType, AttributeData, CellOrder, CellValNum, DimensionData, Mode,
    TileOrder,
};
pub use tilegrid_common::datatype::Datatype;
pub use tilegrid_common::filter::{CompressionData, CompressionType};
pub use tilegrid_common::query::QueryStatus;
pub use tilegrid_common::range::SingleValueRange;

pub use array::{Array, Domain, DomainBuilder, Schema, SchemaBuilder};
pub use config::Config;
pub use context::Context;
pub use error::{Error, Result};
pub use query::{
    BuffersError, Query, QueryBuilder, QueryFields, QueryFieldsBuilder,
};
pub use storage::ObjectType;
pub use subarray::Subarray;

pub mod constants {
    /// The reserved field name under which a read retrieves cell
    /// coordinates, and a sparse write supplies them.
    pub const COORDS: &str = "__coords";

    /// The size in bytes of one record in a variable-length offsets
    /// buffer.
    pub const CELL_VAR_OFFSET_SIZE: u64 = 8;
}
