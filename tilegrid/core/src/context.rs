use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::pool::ThreadPool;
use crate::storage::{ObjectType, Storage};

struct ContextInner {
    config: Config,
    pool: ThreadPool,
    storage: Storage,
}

/// Process-level engine state: configuration, the planning thread
/// pool, and the object store. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn new() -> Result<Self> {
        Self::with_config(Config::new())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let pool = ThreadPool::new(config.compute_threads())?;
        Ok(Context {
            inner: Arc::new(ContextInner {
                config,
                pool,
                storage: Storage::default(),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn thread_pool(&self) -> &ThreadPool {
        &self.inner.pool
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    pub fn object_type(&self, uri: &str) -> ObjectType {
        self.inner.storage.object_type(uri)
    }

    pub fn object_remove(&self, uri: &str) -> Result<()> {
        self.inner.storage.object_remove(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_store_lifecycle() {
        use tilegrid_common::array::{ArrayType, AttributeData, DimensionData};
        use tilegrid_common::datatype::Datatype;

        use crate::array::{Array, DomainBuilder, Schema};

        let ctx = Context::new().unwrap();
        assert_eq!(ObjectType::Invalid, ctx.object_type("quickstart"));

        let domain = DomainBuilder::new()
            .add_dimension(DimensionData {
                name: "d1".to_owned(),
                constraints: ([1u64, 4], 2u64).into(),
            })
            .unwrap()
            .build()
            .unwrap();
        let schema = Schema::builder(ArrayType::Sparse, domain)
            .add_attribute(AttributeData::new("a1", Datatype::Int32))
            .unwrap()
            .build()
            .unwrap();

        Array::create(&ctx, "quickstart", schema).unwrap();
        assert_eq!(ObjectType::Array, ctx.object_type("quickstart"));

        ctx.object_remove("quickstart").unwrap();
        assert_eq!(ObjectType::Invalid, ctx.object_type("quickstart"));
        assert!(ctx.object_remove("quickstart").is_err());
    }
}
