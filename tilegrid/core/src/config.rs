use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Sizes the planning thread pool; a value of zero or less selects the
/// hardware concurrency.
pub const COMPUTE_THREADS: &str = "sm.compute_threads";

/// Multiplies the `size_fixed`/`size_var` members of result-size
/// estimates. Never applied to the `mem_size_*` members.
pub const EST_RESULT_SIZE_AMPLIFICATION: &str =
    "sm.est_result_size_amplification";

/// Advisory cap in bytes for internal working memory during planning.
pub const MEMORY_BUDGET: &str = "sm.memory_budget";

/// String-keyed engine configuration.
///
/// Unrecognized keys are retained verbatim; recognized keys are
/// validated when set.
#[derive(Clone, Debug, Default)]
pub struct Config {
    params: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            COMPUTE_THREADS => {
                value.parse::<i64>().map_err(|_| {
                    Error::InvalidArgument(format!(
                        "'{COMPUTE_THREADS}' expects an integer, found '{value}'"
                    ))
                })?;
            }
            EST_RESULT_SIZE_AMPLIFICATION => {
                let amplification =
                    value.parse::<f64>().map_err(|_| {
                        Error::InvalidArgument(format!(
                            "'{EST_RESULT_SIZE_AMPLIFICATION}' expects a float, found '{value}'"
                        ))
                    })?;
                if amplification.is_nan() || amplification < 1.0 {
                    return Err(Error::InvalidArgument(format!(
                        "'{EST_RESULT_SIZE_AMPLIFICATION}' must be at least 1.0, found {amplification}"
                    )));
                }
            }
            MEMORY_BUDGET => {
                value.parse::<u64>().map_err(|_| {
                    Error::InvalidArgument(format!(
                        "'{MEMORY_BUDGET}' expects an unsigned integer, found '{value}'"
                    ))
                })?;
            }
            _ => (),
        };
        self.params.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub(crate) fn compute_threads(&self) -> usize {
        let configured = self
            .get(COMPUTE_THREADS)
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0);
        if configured > 0 {
            configured as usize
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub(crate) fn est_result_size_amplification(&self) -> f64 {
        self.get(EST_RESULT_SIZE_AMPLIFICATION)
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(1.0)
    }

    /// The advisory planning memory budget, if one is configured.
    pub fn memory_budget(&self) -> Option<u64> {
        self.get(MEMORY_BUDGET)
            .and_then(|value| value.parse::<u64>().ok())
    }
}
