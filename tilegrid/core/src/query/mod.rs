//! Queries: the binding of an array, a subarray, a layout, and caller
//! buffers to a single execution.

pub mod buffers;
pub mod read;
pub mod write;

pub use buffers::{
    BuffersError, FieldCapacity, QueryBuffers, QueryFields,
    QueryFieldsBuilder,
};

use std::collections::HashMap;

use tilegrid_common::array::{CellOrder, Mode};
use tilegrid_common::datatype::PhysicalType;
use tilegrid_common::query::QueryStatus;
use tilegrid_common::range::SingleValueRange;

use crate::array::Array;
use crate::constants;
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::subarray::Subarray;

use read::{submit_read, ReadState};
use write::{submit_write, WriteData};

/// A configured query, ready to submit.
///
/// A read is submitted repeatedly until [QueryStatus::Completed];
/// each submission delivers as many cells as the buffers hold.
/// Finalization consumes the query and, for writes, commits the
/// staged fragment.
pub struct Query {
    array: Array,
    query_type: Mode,
    layout: CellOrder,
    subarray: Subarray,
    buffers: QueryBuffers,
    write_data: HashMap<String, WriteData>,
    status: QueryStatus,
    read_state: ReadState,
    pending_fragment: Option<Fragment>,
}

impl Query {
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn query_type(&self) -> Mode {
        self.query_type
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn subarray(&self) -> &Subarray {
        &self.subarray
    }

    /// Runs one submission.
    ///
    /// Reads return [QueryStatus::Incomplete] when the buffers filled
    /// before the selection was exhausted; resubmitting continues from
    /// the internal cursor. A read whose next variable-length cell can
    /// never fit fails with [Error::BufferOverflow]; the query stays
    /// resubmittable so the buffers can be regrown through
    /// [Query::reset_buffers]. Planning errors are terminal.
    pub fn submit(&mut self) -> Result<QueryStatus> {
        if self.status.is_terminal() {
            return Err(Error::IllegalState(format!(
                "cannot submit a query with status {:?}",
                self.status
            )));
        }
        self.status = QueryStatus::InProgress;

        let result = match self.query_type {
            Mode::Read => submit_read(
                &self.array,
                self.layout,
                &mut self.subarray,
                &mut self.buffers,
                &mut self.read_state,
            ),
            Mode::Write => {
                submit_write(&self.array, self.layout, &self.write_data).map(
                    |fragment| {
                        self.pending_fragment = Some(fragment);
                        QueryStatus::Completed
                    },
                )
            }
        };

        match result {
            Ok(status) => {
                self.status = status;
                Ok(status)
            }
            Err(err) => {
                self.status = match &err {
                    // the submission failed but the query may be
                    // reconfigured and resubmitted
                    Error::BufferOverflow(_) => QueryStatus::Incomplete,
                    // rejected arguments leave the query usable
                    Error::InvalidArgument(_) => QueryStatus::Initialized,
                    _ => QueryStatus::Failed,
                };
                Err(err)
            }
        }
    }

    /// Replaces the read buffers between submissions, subject to the
    /// size-monotonicity rule of [QueryBuffers].
    pub fn reset_buffers(&mut self, fields: QueryFields) -> Result<()> {
        if self.query_type != Mode::Read {
            return Err(Error::IllegalState(
                "only read queries take result buffers".to_owned(),
            ));
        }
        if self.status.is_terminal() {
            return Err(Error::IllegalState(format!(
                "cannot reset buffers with status {:?}",
                self.status
            )));
        }
        self.buffers.replace(fields)?;
        Ok(())
    }

    /// The result buffers of the last read submission.
    pub fn buffers(&self) -> &QueryBuffers {
        &self.buffers
    }

    /// Releases the query; commits the staged fragment for writes.
    pub fn finalize(self) -> Result<Array> {
        if let Some(fragment) = self.pending_fragment {
            self.array
                .context()
                .storage()
                .append_fragment(self.array.uri(), fragment)?;
        }
        Ok(self.array)
    }
}

/// Configures and creates [Query] instances.
pub struct QueryBuilder {
    array: Array,
    query_type: Mode,
    layout: CellOrder,
    subarray: Option<Subarray>,
    fields: QueryFields,
    write_data: HashMap<String, WriteData>,
}

impl QueryBuilder {
    pub fn new(array: Array, query_type: Mode) -> Self {
        QueryBuilder {
            array,
            query_type,
            layout: CellOrder::RowMajor,
            subarray: None,
            fields: Default::default(),
            write_data: HashMap::new(),
        }
    }

    pub fn read(array: Array) -> Self {
        Self::new(array, Mode::Read)
    }

    pub fn write(array: Array) -> Self {
        Self::new(array, Mode::Write)
    }

    pub fn with_layout(mut self, layout: CellOrder) -> Self {
        self.layout = layout;
        self
    }

    /// Starts configuring the rectangular selection of a read.
    pub fn start_subarray(self) -> SubarrayBuilder {
        let subarray = Subarray::new(&self.array, self.layout);
        SubarrayBuilder {
            builder: self,
            subarray,
        }
    }

    pub fn with_subarray(mut self, subarray: Subarray) -> Self {
        self.subarray = Some(subarray);
        self
    }

    /// Declares the fields a read delivers and their buffer
    /// capacities.
    pub fn with_fields(mut self, fields: QueryFields) -> Self {
        self.fields = fields;
        self
    }

    /// Supplies a fixed-size attribute's values for a write.
    pub fn data_typed<S, T>(mut self, name: S, values: &[T]) -> Self
    where
        S: Into<String>,
        T: PhysicalType,
    {
        let mut data = Vec::with_capacity(values.len() * T::SIZE);
        for value in values {
            value.write_le(&mut data);
        }
        self.write_data
            .insert(name.into(), WriteData { data, offsets: None });
        self
    }

    /// Supplies a variable-length attribute's offsets and values for a
    /// write.
    pub fn data_var_typed<S, T>(
        mut self,
        name: S,
        offsets: &[u64],
        values: &[T],
    ) -> Self
    where
        S: Into<String>,
        T: PhysicalType,
    {
        let mut data = Vec::with_capacity(values.len() * T::SIZE);
        for value in values {
            value.write_le(&mut data);
        }
        self.write_data.insert(
            name.into(),
            WriteData {
                data,
                offsets: Some(offsets.to_vec()),
            },
        );
        self
    }

    /// Supplies the coordinates of a sparse write, interleaved per
    /// cell.
    pub fn coords_typed<T>(self, values: &[T]) -> Self
    where
        T: PhysicalType,
    {
        self.data_typed(constants::COORDS, values)
    }

    pub fn build(self) -> Result<Query> {
        self.array.expect_mode(self.query_type)?;

        match self.query_type {
            Mode::Read => {
                if self.fields.fields.is_empty() {
                    return Err(Error::InvalidArgument(
                        "a read requires at least one field buffer"
                            .to_owned(),
                    ));
                }
                if self.array.schema().is_dense()
                    && self
                        .fields
                        .fields
                        .iter()
                        .any(|(name, _)| name == constants::COORDS)
                {
                    return Err(Error::InvalidArgument(
                        "coordinates are only readable from sparse arrays"
                            .to_owned(),
                    ));
                }
                if !self.write_data.is_empty() {
                    return Err(Error::InvalidArgument(
                        "read queries take no write buffers".to_owned(),
                    ));
                }
            }
            Mode::Write => {
                if self.subarray.is_some() {
                    return Err(Error::InvalidArgument(
                        "writes cover the array domain and take no subarray"
                            .to_owned(),
                    ));
                }
                if !self.fields.fields.is_empty() {
                    return Err(Error::InvalidArgument(
                        "write queries take no result buffers".to_owned(),
                    ));
                }
            }
        }

        let buffers =
            QueryBuffers::from_fields(self.array.schema(), self.fields)?;
        let subarray = self
            .subarray
            .unwrap_or_else(|| Subarray::new(&self.array, self.layout));

        Ok(Query {
            array: self.array,
            query_type: self.query_type,
            layout: self.layout,
            subarray,
            buffers,
            write_data: self.write_data,
            status: QueryStatus::Initialized,
            read_state: ReadState::default(),
            pending_fragment: None,
        })
    }
}

/// Adds ranges to a query's subarray, dimension by dimension.
pub struct SubarrayBuilder {
    builder: QueryBuilder,
    subarray: Subarray,
}

impl SubarrayBuilder {
    pub fn add_range<R>(mut self, dim_idx: usize, range: R) -> Result<Self>
    where
        R: Into<SingleValueRange>,
    {
        self.subarray.add_range(dim_idx, range)?;
        Ok(self)
    }

    /// Applies the subarray to the query, returning the query builder.
    pub fn finish(mut self) -> QueryBuilder {
        self.builder.subarray = Some(self.subarray);
        self.builder
    }
}
