//! Result-size estimation: bounds on the bytes a read will deliver
//! into caller buffers, derived from tile overlap and per-tile sizes.

use std::collections::HashMap;

use crate::constants;
use crate::error::{Error, Result};
use crate::pool::collect_statuses;
use crate::subarray::Subarray;

/// Estimated result sizes for one field.
///
/// The `size_*` members estimate the bytes written to caller buffers;
/// the `mem_size_*` members are upper bounds on internal working
/// memory, charging the full cost of any touched tile regardless of
/// partial overlap.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResultSize {
    pub size_fixed: f64,
    pub size_var: f64,
    pub mem_size_fixed: u64,
    pub mem_size_var: u64,
}

impl ResultSize {
    fn accumulate(&mut self, other: &ResultSize) {
        self.size_fixed += other.size_fixed;
        self.size_var += other.size_var;
        self.mem_size_fixed += other.mem_size_fixed;
        self.mem_size_var += other.mem_size_var;
    }
}

fn safe_mul(a: u64, b: u64) -> u64 {
    a.saturating_mul(b)
}

impl Subarray {
    /// The estimated result size in bytes for a fixed-size field.
    pub fn get_est_result_size(&mut self, field: &str) -> Result<u64> {
        self.check_est_request(field, false)?;
        self.compute_est_result_size()?;
        Ok(self.est_result_size[field].size_fixed.ceil() as u64)
    }

    /// The estimated result sizes in bytes (offsets, values) for a
    /// variable-length field.
    pub fn get_est_result_size_var(
        &mut self,
        field: &str,
    ) -> Result<(u64, u64)> {
        self.check_est_request(field, true)?;
        self.compute_est_result_size()?;
        let est = &self.est_result_size[field];
        Ok((est.size_fixed.ceil() as u64, est.size_var.ceil() as u64))
    }

    /// The maximum internal memory in bytes a read of a fixed-size
    /// field may require.
    pub fn get_max_memory_size(&mut self, field: &str) -> Result<u64> {
        self.check_est_request(field, false)?;
        self.compute_est_result_size()?;
        Ok(self.est_result_size[field].mem_size_fixed)
    }

    /// The maximum internal memory in bytes (offsets, values) a read
    /// of a variable-length field may require.
    pub fn get_max_memory_size_var(
        &mut self,
        field: &str,
    ) -> Result<(u64, u64)> {
        self.check_est_request(field, true)?;
        self.compute_est_result_size()?;
        let est = &self.est_result_size[field];
        Ok((est.mem_size_fixed, est.mem_size_var))
    }

    fn check_est_request(&self, field: &str, want_var: bool) -> Result<()> {
        if self.array().schema().is_dense() {
            return Err(Error::InvalidArgument(
                "result size estimation is not supported for dense arrays"
                    .to_owned(),
            ));
        }
        if !self.array().schema().has_field(field) {
            return Err(Error::InvalidArgument(format!(
                "no such field: '{field}'"
            )));
        }
        let is_var = self.array().schema().field_is_var(field)?;
        if want_var && !is_var {
            return Err(Error::InvalidArgument(format!(
                "field '{field}' must be variable-length"
            )));
        }
        if !want_var && is_var {
            return Err(Error::InvalidArgument(format!(
                "field '{field}' must be fixed-size"
            )));
        }
        Ok(())
    }

    /// Computes and memoizes per-field result-size estimates for every
    /// attribute and, for sparse arrays, the coordinates.
    pub(crate) fn compute_est_result_size(&mut self) -> Result<()> {
        if self.result_est_size_computed {
            return Ok(());
        }

        self.compute_tile_overlap()?;

        let mut fields = self
            .array()
            .schema()
            .attributes()
            .iter()
            .map(|a| (a.name.clone(), a.is_var_sized()))
            .collect::<Vec<(String, bool)>>();
        if !self.array().schema().is_dense() {
            fields.push((constants::COORDS.to_owned(), false));
        }

        let range_num = self.range_num();
        tracing::debug!(
            range_num,
            field_num = fields.len(),
            "estimating result sizes"
        );

        // one partial accumulator per task, reduced by an
        // order-independent fold
        let statuses = self.array().context().thread_pool().parallel_for(
            0,
            range_num,
            |r| {
                fields
                    .iter()
                    .map(|(name, var_size)| {
                        self.est_result_size_for_range(name, r, *var_size)
                    })
                    .collect::<Result<Vec<ResultSize>>>()
            },
        );

        let mut totals = vec![ResultSize::default(); fields.len()];
        for partial in collect_statuses(statuses)? {
            for (total, part) in totals.iter_mut().zip(partial.iter()) {
                total.accumulate(part);
            }
        }

        let amplification =
            self.array().context().config().est_result_size_amplification();
        if amplification != 1.0 {
            for total in totals.iter_mut() {
                total.size_fixed *= amplification;
                total.size_var *= amplification;
            }
        }

        self.est_result_size = fields
            .into_iter()
            .map(|(name, _)| name)
            .zip(totals)
            .collect::<HashMap<String, ResultSize>>();
        self.result_est_size_computed = true;
        Ok(())
    }

    /// The contribution of one range to one field's estimate.
    fn est_result_size_for_range(
        &self,
        field: &str,
        range_idx: u64,
        var_size: bool,
    ) -> Result<ResultSize> {
        let mut ret = ResultSize::default();

        for (f, fragment) in self.array().fragments().iter().enumerate() {
            let meta = fragment.metadata();
            let overlap = &self.tile_overlap()[f][range_idx as usize];

            for tile_range in overlap.tile_ranges.iter() {
                for tile_id in tile_range[0]..=tile_range[1] {
                    let tile_size = meta.tile_size(field, tile_id)?;
                    ret.size_fixed += tile_size as f64;
                    ret.mem_size_fixed += tile_size;
                    if var_size {
                        let tile_var_size =
                            meta.tile_var_size(field, tile_id)?;
                        ret.size_var += tile_var_size as f64;
                        ret.mem_size_var += tile_var_size;
                    }
                }
            }

            for (tile_id, ratio) in overlap.tiles.iter() {
                let tile_size = meta.tile_size(field, *tile_id)?;
                ret.size_fixed += tile_size as f64 * ratio;
                // memory is charged for the whole tile, not pro-rated
                ret.mem_size_fixed += tile_size;
                if var_size {
                    let tile_var_size = meta.tile_var_size(field, *tile_id)?;
                    ret.size_var += tile_var_size as f64 * ratio;
                    ret.mem_size_var += tile_var_size;
                }
            }
        }

        // calibrate against the selected cell count; the fixed cap is
        // computed for both fixed- and variable-length fields
        let cell_num = self.cell_num(range_idx);
        let max_size_fixed = if var_size {
            safe_mul(cell_num, constants::CELL_VAR_OFFSET_SIZE)
        } else {
            let cell_size = self
                .array()
                .schema()
                .cell_size(field)?
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "field '{field}' has no fixed cell size"
                    ))
                })?;
            safe_mul(cell_num, cell_size)
        };
        let max_size_var = u64::MAX;

        ret.size_fixed = ret.size_fixed.min(max_size_fixed as f64);
        ret.size_var = ret.size_var.min(max_size_var as f64);

        Ok(ret)
    }
}
