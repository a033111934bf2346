pub mod schema;

pub use schema::{Domain, DomainBuilder, Schema, SchemaBuilder};

use std::sync::Arc;

use tilegrid_common::array::Mode;
use tilegrid_common::range::MinimumBoundingRectangle;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::storage::ObjectType;

/// An open handle to an array: its schema and a snapshot of its
/// fragments taken at open time.
///
/// Handles are cheap to clone and immutable while open; writes
/// committed after an open are not observed by it.
#[derive(Clone)]
pub struct Array {
    context: Context,
    uri: String,
    mode: Mode,
    schema: Arc<Schema>,
    fragments: Vec<Arc<Fragment>>,
}

impl Array {
    pub fn create(context: &Context, uri: &str, schema: Schema) -> Result<()> {
        context.storage().create_array(uri, schema)
    }

    pub fn exists(context: &Context, uri: &str) -> bool {
        matches!(context.object_type(uri), ObjectType::Array)
    }

    pub fn open(context: &Context, uri: &str, mode: Mode) -> Result<Array> {
        let (schema, fragments) = context.storage().open_array(uri)?;
        Ok(Array {
            context: context.clone(),
            uri: uri.to_owned(),
            mode,
            schema,
            fragments,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn fragments(&self) -> &[Arc<Fragment>] {
        &self.fragments
    }

    pub fn fragment_num(&self) -> usize {
        self.fragments.len()
    }

    /// The union of the written coordinate bounds per dimension, or
    /// `None` if nothing has been written.
    pub fn non_empty_domain(&self) -> Option<MinimumBoundingRectangle> {
        let mut union: Option<MinimumBoundingRectangle> = None;
        for fragment in self.fragments.iter() {
            let Some(mbr) = fragment.metadata().non_empty_domain() else {
                continue;
            };
            union = Some(match union {
                None => mbr.clone(),
                Some(acc) => acc
                    .iter()
                    .zip(mbr.iter())
                    .map(|(l, r)| l.union(r))
                    .collect(),
            });
        }
        union
    }

    /// Guards operations which require the array to be open for
    /// `expected`.
    pub(crate) fn expect_mode(&self, expected: Mode) -> Result<()> {
        if self.mode != expected {
            return Err(Error::IllegalState(format!(
                "array is open for {:?}, operation requires {:?}",
                self.mode, expected
            )));
        }
        Ok(())
    }
}
