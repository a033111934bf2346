//! Caller-visible result buffers with caller-fixed byte capacities.
//!
//! A read query owns one [FieldBuffer] per configured field. The
//! caller declares each buffer's capacity in bytes up front; a
//! submission appends into the buffers and never exceeds the declared
//! capacity. Between submissions the capacities may be replaced, but
//! never below the capacities declared originally, so the driver's
//! read cursor stays valid.

use thiserror::Error;

use tilegrid_common::datatype::PhysicalType;

use crate::array::Schema;
use crate::constants;
use crate::error::{Error as EngineError, Result};

#[derive(Clone, Debug, Error)]
pub enum BuffersError {
    #[error(
        "Buffer for field '{field}' would shrink from {original} to {requested} bytes"
    )]
    SizeSmaller {
        field: String,
        original: u64,
        requested: u64,
    },
    #[error("Replacement buffers must cover field '{0}'")]
    MissingField(String),
    #[error("Replacement buffers name an unknown field '{0}'")]
    UnknownField(String),
    #[error("Field '{0}' is variable-length and requires an offsets buffer")]
    ExpectedOffsets(String),
    #[error("Field '{0}' is fixed-size and takes no offsets buffer")]
    UnexpectedOffsets(String),
}

/// The caller-declared byte capacities for one field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldCapacity {
    Fixed { data: u64 },
    Var { offsets: u64, data: u64 },
}

impl FieldCapacity {
    fn data(&self) -> u64 {
        match self {
            FieldCapacity::Fixed { data } => *data,
            FieldCapacity::Var { data, .. } => *data,
        }
    }

    fn offsets(&self) -> Option<u64> {
        match self {
            FieldCapacity::Fixed { .. } => None,
            FieldCapacity::Var { offsets, .. } => Some(*offsets),
        }
    }
}

/// The list of fields a read delivers, with their buffer capacities.
#[derive(Clone, Debug, Default)]
pub struct QueryFields {
    pub(crate) fields: Vec<(String, FieldCapacity)>,
}

impl QueryFields {
    pub fn builder() -> QueryFieldsBuilder {
        Default::default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct QueryFieldsBuilder {
    fields: Vec<(String, FieldCapacity)>,
}

impl QueryFieldsBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn field<S: Into<String>>(mut self, name: S, data: u64) -> Self {
        self.fields
            .push((name.into(), FieldCapacity::Fixed { data }));
        self
    }

    pub fn field_var<S: Into<String>>(
        mut self,
        name: S,
        offsets: u64,
        data: u64,
    ) -> Self {
        self.fields
            .push((name.into(), FieldCapacity::Var { offsets, data }));
        self
    }

    pub fn build(self) -> QueryFields {
        QueryFields {
            fields: self.fields,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FieldBuffer {
    original: FieldCapacity,
    capacity: FieldCapacity,
    pub(crate) data: Vec<u8>,
    pub(crate) offsets: Vec<u64>,
}

impl FieldBuffer {
    pub fn is_var(&self) -> bool {
        matches!(self.capacity, FieldCapacity::Var { .. })
    }

    pub fn data_capacity(&self) -> u64 {
        self.capacity.data()
    }

    pub fn offsets_capacity(&self) -> u64 {
        self.capacity.offsets().unwrap_or(0)
    }

    pub fn data_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn offsets_size(&self) -> u64 {
        self.offsets.len() as u64 * constants::CELL_VAR_OFFSET_SIZE
    }

    /// Whether a cell of `value_len` bytes fits into the remaining
    /// capacity.
    pub fn fits(&self, value_len: u64) -> bool {
        if self.data_size() + value_len > self.data_capacity() {
            return false;
        }
        if self.is_var()
            && self.offsets_size() + constants::CELL_VAR_OFFSET_SIZE
                > self.offsets_capacity()
        {
            return false;
        }
        true
    }

    /// Whether a cell of `value_len` bytes could ever fit, i.e. fits
    /// into this buffer when it is empty.
    pub fn fits_when_empty(&self, value_len: u64) -> bool {
        value_len <= self.data_capacity()
            && (!self.is_var()
                || constants::CELL_VAR_OFFSET_SIZE <= self.offsets_capacity())
    }

    pub fn append(&mut self, value: &[u8]) {
        if self.is_var() {
            self.offsets.push(self.data.len() as u64);
        }
        self.data.extend_from_slice(value);
    }
}

/// The ordered set of per-field result buffers of one read query.
#[derive(Debug, Default)]
pub struct QueryBuffers {
    fields: Vec<(String, FieldBuffer)>,
}

impl QueryBuffers {
    pub(crate) fn from_fields(
        schema: &Schema,
        fields: QueryFields,
    ) -> Result<QueryBuffers> {
        let mut out: Vec<(String, FieldBuffer)> = Vec::new();
        for (name, capacity) in fields.fields {
            if !schema.has_field(&name) {
                return Err(EngineError::InvalidArgument(format!(
                    "no such field: '{name}'"
                )));
            }
            if out.iter().any(|(existing, _)| *existing == name) {
                return Err(EngineError::InvalidArgument(format!(
                    "duplicate field: '{name}'"
                )));
            }
            let is_var = schema.field_is_var(&name)?;
            match (is_var, &capacity) {
                (true, FieldCapacity::Fixed { .. }) => {
                    return Err(
                        BuffersError::ExpectedOffsets(name.clone()).into()
                    );
                }
                (false, FieldCapacity::Var { .. }) => {
                    return Err(
                        BuffersError::UnexpectedOffsets(name.clone()).into()
                    );
                }
                _ => (),
            }
            out.push((
                name,
                FieldBuffer {
                    original: capacity,
                    capacity,
                    data: Vec::new(),
                    offsets: Vec::new(),
                },
            ));
        }
        Ok(QueryBuffers { fields: out })
    }

    /// Replaces the buffer capacities between submissions.
    ///
    /// Every configured field must be covered, keep its shape, and
    /// keep capacities at or above those supplied originally.
    pub(crate) fn replace(
        &mut self,
        fields: QueryFields,
    ) -> std::result::Result<(), BuffersError> {
        for (name, _) in fields.fields.iter() {
            if !self.fields.iter().any(|(existing, _)| existing == name) {
                return Err(BuffersError::UnknownField(name.clone()));
            }
        }

        for (name, buffer) in self.fields.iter() {
            let (_, requested) = fields
                .fields
                .iter()
                .find(|(n, _)| n == name)
                .ok_or_else(|| BuffersError::MissingField(name.clone()))?;

            match (buffer.is_var(), requested) {
                (true, FieldCapacity::Fixed { .. }) => {
                    return Err(BuffersError::ExpectedOffsets(name.clone()));
                }
                (false, FieldCapacity::Var { .. }) => {
                    return Err(BuffersError::UnexpectedOffsets(name.clone()));
                }
                _ => (),
            }

            if requested.data() < buffer.original.data() {
                return Err(BuffersError::SizeSmaller {
                    field: name.clone(),
                    original: buffer.original.data(),
                    requested: requested.data(),
                });
            }
            if let (Some(requested), Some(original)) =
                (requested.offsets(), buffer.original.offsets())
            {
                if requested < original {
                    return Err(BuffersError::SizeSmaller {
                        field: name.clone(),
                        original,
                        requested,
                    });
                }
            }
        }

        for (name, requested) in fields.fields {
            if let Some((_, buffer)) =
                self.fields.iter_mut().find(|(n, _)| *n == name)
            {
                buffer.capacity = requested;
                buffer.data.clear();
                buffer.offsets.clear();
            }
        }
        Ok(())
    }

    /// Clears written lengths ahead of a read submission.
    pub(crate) fn reset_lengths(&mut self) {
        for (_, buffer) in self.fields.iter_mut() {
            buffer.data.clear();
            buffer.offsets.clear();
        }
    }

    /// Whether nothing has been written since the last length reset.
    pub(crate) fn all_empty(&self) -> bool {
        self.fields
            .iter()
            .all(|(_, b)| b.data.is_empty() && b.offsets.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn iter(
        &self,
    ) -> impl Iterator<Item = &(String, FieldBuffer)> {
        self.fields.iter()
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut (String, FieldBuffer)> {
        self.fields.iter_mut()
    }

    fn find(&self, field: &str) -> Option<&FieldBuffer> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, buffer)| buffer)
    }

    /// The bytes written into a field's data buffer by the last
    /// submission.
    pub fn bytes(&self, field: &str) -> Option<&[u8]> {
        self.find(field).map(|b| b.data.as_slice())
    }

    /// The offsets written for a variable-length field: the byte
    /// offset of each cell within this submission's data buffer.
    pub fn offsets(&self, field: &str) -> Option<&[u64]> {
        self.find(field).map(|b| b.offsets.as_slice())
    }

    /// The number of bytes written into the data buffer.
    pub fn data_size(&self, field: &str) -> Option<u64> {
        self.find(field).map(FieldBuffer::data_size)
    }

    /// The number of bytes written into the offsets buffer.
    pub fn offsets_size(&self, field: &str) -> Option<u64> {
        self.find(field).map(FieldBuffer::offsets_size)
    }

    /// The data buffer reinterpreted as values of `T`.
    pub fn data_typed<T>(&self, field: &str) -> Option<Vec<T>>
    where
        T: PhysicalType,
    {
        self.find(field).map(|b| {
            b.data.chunks_exact(T::SIZE).map(T::read_le).collect()
        })
    }
}
