//! The context-owned object store.
//!
//! Arrays are addressed by URI. The store keeps each array's schema and
//! its fragments in creation order; opening an array takes a snapshot
//! of both, so an open array never observes later writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::array::Schema;
use crate::error::{Error, Result};
use crate::fragment::Fragment;

/// The kind of object a URI resolves to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObjectType {
    Array,
    Invalid,
}

struct StoredArray {
    schema: Arc<Schema>,
    fragments: Vec<Arc<Fragment>>,
}

#[derive(Default)]
pub(crate) struct Storage {
    arrays: Mutex<HashMap<String, StoredArray>>,
}

impl Storage {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredArray>> {
        self.arrays.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create_array(&self, uri: &str, schema: Schema) -> Result<()> {
        let mut arrays = self.lock();
        if arrays.contains_key(uri) {
            return Err(Error::InvalidArgument(format!(
                "an array already exists at '{uri}'"
            )));
        }
        arrays.insert(
            uri.to_owned(),
            StoredArray {
                schema: Arc::new(schema),
                fragments: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn open_array(
        &self,
        uri: &str,
    ) -> Result<(Arc<Schema>, Vec<Arc<Fragment>>)> {
        let arrays = self.lock();
        let stored = arrays.get(uri).ok_or_else(|| {
            Error::InvalidArgument(format!("no array at '{uri}'"))
        })?;
        Ok((Arc::clone(&stored.schema), stored.fragments.clone()))
    }

    pub fn append_fragment(&self, uri: &str, fragment: Fragment) -> Result<()> {
        let mut arrays = self.lock();
        let stored = arrays.get_mut(uri).ok_or_else(|| {
            Error::InvalidArgument(format!("no array at '{uri}'"))
        })?;
        stored.fragments.push(Arc::new(fragment));
        Ok(())
    }

    pub fn object_type(&self, uri: &str) -> ObjectType {
        if self.lock().contains_key(uri) {
            ObjectType::Array
        } else {
            ObjectType::Invalid
        }
    }

    pub fn object_remove(&self, uri: &str) -> Result<()> {
        self.lock().remove(uri).map(|_| ()).ok_or_else(|| {
            Error::InvalidArgument(format!("no object at '{uri}'"))
        })
    }
}
