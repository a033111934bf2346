//! Subarrays: the per-query selection of rectangular ranges, their
//! enumeration order, and the planning state derived from them.

pub mod est;

pub use est::ResultSize;

use std::collections::HashMap;

use tilegrid_common::array::CellOrder;
use tilegrid_common::datatype::Datatype;
use tilegrid_common::range::SingleValueRange;
use tilegrid_common::single_value_range_go;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::pool::collect_statuses;
use crate::rtree::TileOverlap;

/// The ordered list of intervals selected on one dimension.
///
/// Construction seeds one *default* range covering the whole domain;
/// the first caller-supplied range replaces a lone default, subsequent
/// ranges append (a multi-range subarray).
#[derive(Clone, Debug)]
pub struct DimensionRanges {
    datatype: Datatype,
    ranges: Vec<SingleValueRange>,
    has_default: bool,
}

impl DimensionRanges {
    pub(crate) fn new(datatype: Datatype) -> Self {
        DimensionRanges {
            datatype,
            ranges: Vec::new(),
            has_default: false,
        }
    }

    pub(crate) fn add_range(
        &mut self,
        range: SingleValueRange,
        is_default: bool,
    ) {
        if is_default {
            self.ranges.push(range);
            self.has_default = true;
        } else if self.has_default && self.ranges.len() == 1 {
            self.ranges[0] = range;
            self.has_default = false;
        } else {
            self.ranges.push(range);
        }
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn get_range(&self, range_idx: u64) -> Option<&SingleValueRange> {
        self.ranges.get(range_idx as usize)
    }

    pub fn range_num(&self) -> u64 {
        self.ranges.len() as u64
    }

    /// The size in bytes of one stored range record: two bounds of the
    /// dimension datatype.
    pub fn range_size(&self) -> u64 {
        2 * self.datatype.size() as u64
    }
}

/// A set of ranges, one list per dimension, selecting the Cartesian
/// product; plus the planning state lazily derived from it.
///
/// Mutating any dimension's ranges invalidates the computed tile
/// overlap and result-size estimates.
#[derive(Clone)]
pub struct Subarray {
    array: Array,
    layout: CellOrder,
    ranges: Vec<DimensionRanges>,
    range_offsets: Vec<u64>,
    tile_overlap: Vec<Vec<TileOverlap>>,
    est_result_size: HashMap<String, ResultSize>,
    result_est_size_computed: bool,
    tile_overlap_computed: bool,
}

impl Subarray {
    /// Constructs a subarray selecting the array's whole domain.
    pub fn new(array: &Array, layout: CellOrder) -> Self {
        let mut ranges = Vec::with_capacity(array.schema().dim_num());
        for dimension in array.schema().domain().dimensions() {
            let mut dim_ranges = DimensionRanges::new(dimension.datatype());
            dim_ranges.add_range(dimension.domain(), true);
            ranges.push(dim_ranges);
        }
        Subarray {
            array: array.clone(),
            layout,
            ranges,
            range_offsets: Vec::new(),
            tile_overlap: Vec::new(),
            est_result_size: HashMap::new(),
            result_est_size_computed: false,
            tile_overlap_computed: false,
        }
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn layout(&self) -> CellOrder {
        self.layout
    }

    pub fn dim_num(&self) -> usize {
        self.ranges.len()
    }

    pub fn empty(&self) -> bool {
        self.range_num() == 0
    }

    /// The total number of ranges: the product of the per-dimension
    /// range counts.
    pub fn range_num(&self) -> u64 {
        if self.ranges.is_empty() {
            return 0;
        }
        self.ranges.iter().map(DimensionRanges::range_num).product()
    }

    pub fn dimension_ranges(&self, dim_idx: usize) -> Result<&DimensionRanges> {
        self.ranges.get(dim_idx).ok_or_else(|| {
            Error::InvalidDimension(format!(
                "index {dim_idx} out of bounds for {} dimensions",
                self.ranges.len()
            ))
        })
    }

    /// Appends a range on a dimension, validating it against the
    /// dimension's datatype and domain. Clears computed planning state.
    pub fn add_range<R>(&mut self, dim_idx: usize, range: R) -> Result<()>
    where
        R: Into<SingleValueRange>,
    {
        let range = range.into();
        if dim_idx >= self.ranges.len() {
            return Err(Error::InvalidDimension(format!(
                "index {dim_idx} out of bounds for {} dimensions",
                self.ranges.len()
            )));
        }

        let datatype = self.ranges[dim_idx].datatype();
        range
            .check_datatype(datatype)
            .map_err(|e| Error::UnsupportedType(e.to_string()))?;

        let (nan, inverted) = match &range {
            SingleValueRange::Float32(lo, hi) => {
                (lo.is_nan() || hi.is_nan(), lo > hi)
            }
            SingleValueRange::Float64(lo, hi) => {
                (lo.is_nan() || hi.is_nan(), lo > hi)
            }
            _ => {
                (false, single_value_range_go!(&range, _DT, lo, hi, lo > hi))
            }
        };
        if nan {
            return Err(Error::InvalidRange(
                "range bounds may not be NaN".to_owned(),
            ));
        }
        if inverted {
            return Err(Error::InvalidRange(
                "lower range bound cannot be larger than the higher bound"
                    .to_owned(),
            ));
        }

        let domain = self.array.schema().domain().dimension(dim_idx)?.domain();
        if !domain.contains_range(&range) {
            return Err(Error::InvalidRange(
                "range must be in the domain the subarray is constructed from"
                    .to_owned(),
            ));
        }

        // any mutation invalidates the planned state
        self.result_est_size_computed = false;
        self.tile_overlap_computed = false;
        self.est_result_size.clear();
        self.tile_overlap.clear();

        self.ranges[dim_idx].add_range(range, false);
        Ok(())
    }

    /// The order in which ranges are enumerated: the explicit layout,
    /// with `Unordered` and `Global` resolving to the array's cell
    /// order.
    pub(crate) fn effective_range_order(&self) -> CellOrder {
        match self.layout {
            CellOrder::RowMajor => CellOrder::RowMajor,
            CellOrder::ColumnMajor => CellOrder::ColumnMajor,
            CellOrder::Unordered | CellOrder::Global => {
                self.array.schema().cell_order()
            }
        }
    }

    pub(crate) fn compute_range_offsets(&mut self) {
        self.range_offsets.clear();
        let dim_num = self.dim_num();

        match self.effective_range_order() {
            CellOrder::ColumnMajor => {
                self.range_offsets.push(1);
                for i in 1..dim_num {
                    let offset = self.range_offsets[i - 1]
                        * self.ranges[i - 1].range_num();
                    self.range_offsets.push(offset);
                }
            }
            _ => {
                // row-major
                self.range_offsets.push(1);
                for i in (0..dim_num.saturating_sub(1)).rev() {
                    let offset = self.range_offsets.last().copied().unwrap_or(1)
                        * self.ranges[i + 1].range_num();
                    self.range_offsets.push(offset);
                }
                self.range_offsets.reverse();
            }
        }
    }

    /// The per-dimension strides used to linearize the Cartesian
    /// product of ranges. Empty until offsets are computed.
    pub fn range_offsets(&self) -> &[u64] {
        &self.range_offsets
    }

    /// Maps per-dimension range coordinates onto the linear range
    /// index for the effective order.
    pub fn range_idx(&self, range_coords: &[u64]) -> u64 {
        self.range_offsets
            .iter()
            .zip(range_coords.iter())
            .map(|(offset, coord)| offset * coord)
            .sum()
    }

    /// Maps a linear range index onto per-dimension range coordinates;
    /// the inverse of [Subarray::range_idx].
    pub fn get_range_coords(&self, range_idx: u64) -> Vec<u64> {
        let dim_num = self.dim_num();
        let mut coords = Vec::with_capacity(dim_num);
        let mut tmp_idx = range_idx;

        match self.effective_range_order() {
            CellOrder::ColumnMajor => {
                for i in (0..dim_num).rev() {
                    coords.push(tmp_idx / self.range_offsets[i]);
                    tmp_idx %= self.range_offsets[i];
                }
                coords.reverse();
            }
            _ => {
                for i in 0..dim_num {
                    coords.push(tmp_idx / self.range_offsets[i]);
                    tmp_idx %= self.range_offsets[i];
                }
            }
        }
        coords
    }

    /// The selected rectangle of the range at `range_idx`: one interval
    /// per dimension.
    pub fn range(&self, range_idx: u64) -> Vec<SingleValueRange> {
        let coords = self.get_range_coords(range_idx);
        self.ranges
            .iter()
            .zip(coords.iter())
            .map(|(dim_ranges, coord)| {
                dim_ranges
                    .get_range(*coord)
                    .expect("range coordinates are within bounds")
                    .clone()
            })
            .collect()
    }

    /// Returns true iff the subarray selects exactly one coordinate.
    pub fn is_unary(&self) -> bool {
        if self.range_num() != 1 {
            return false;
        }
        self.ranges.iter().all(|dim_ranges| {
            dim_ranges
                .get_range(0)
                .map(SingleValueRange::is_point)
                .unwrap_or(false)
        })
    }

    /// Returns true iff the range at `range_idx` selects exactly one
    /// coordinate.
    pub fn is_unary_range(&self, range_idx: u64) -> bool {
        self.range(range_idx).iter().all(SingleValueRange::is_point)
    }

    /// The number of cells selected by the range at `range_idx`,
    /// saturating to `u64::MAX`. Non-unary ranges over float domains
    /// have no finite cell count and saturate.
    pub fn cell_num(&self, range_idx: u64) -> u64 {
        if self.is_unary_range(range_idx) {
            return 1;
        }

        let mut cells = 1u64;
        for interval in self.range(range_idx).iter() {
            let dim_cells = match interval.num_cells() {
                Some(n) => n.min(u64::MAX as u128) as u64,
                None => {
                    if interval.is_point() {
                        1
                    } else {
                        u64::MAX
                    }
                }
            };
            cells = cells.saturating_mul(dim_cells);
        }
        cells
    }

    /// Slices this subarray to the inclusive linear range span
    /// `[start, end]`.
    ///
    /// The slice is normalized through per-dimension coordinate spans:
    /// the result selects, for each dimension, the ranges between the
    /// start and end coordinates, i.e. the rectangle of the range grid
    /// spanned by `start` and `end`. Computed tile overlap columns are
    /// carried over for the span.
    pub fn get_subarray(&self, start: u64, end: u64) -> Result<Subarray> {
        if start > end || end >= self.range_num() {
            return Err(Error::InvalidArgument(format!(
                "invalid range span [{start}, {end}] for {} ranges",
                self.range_num()
            )));
        }
        if self.range_offsets.len() != self.dim_num() {
            return Err(Error::IllegalState(
                "range offsets are not computed".to_owned(),
            ));
        }

        let mut ret = Subarray::new(&self.array, self.layout);

        let start_coords = self.get_range_coords(start);
        let end_coords = self.get_range_coords(end);

        for dim_idx in 0..self.dim_num() {
            for r in start_coords[dim_idx]..=end_coords[dim_idx] {
                let range = self.ranges[dim_idx]
                    .get_range(r)
                    .expect("range coordinates are within bounds")
                    .clone();
                ret.ranges[dim_idx].add_range(range, false);
            }
        }

        // the linear span matches the sliced rectangle only when the
        // caller selected a contiguous rectangle of the range grid in
        // layout order; otherwise the overlap is left to recompute
        if self.tile_overlap_computed && end - start + 1 == ret.range_num() {
            ret.tile_overlap = self
                .tile_overlap
                .iter()
                .map(|per_fragment| {
                    per_fragment[start as usize..=end as usize].to_vec()
                })
                .collect();
            ret.tile_overlap_computed = true;
        }

        ret.compute_range_offsets();
        Ok(ret)
    }

    /// Computes the per-(fragment, range) tile overlap, in parallel,
    /// memoized until a range mutation.
    pub fn compute_tile_overlap(&mut self) -> Result<()> {
        if self.tile_overlap_computed {
            return Ok(());
        }

        self.compute_range_offsets();

        let fragment_num = self.array.fragment_num() as u64;
        let range_num = self.range_num();
        tracing::debug!(fragment_num, range_num, "computing tile overlap");

        let statuses = self.array.context().thread_pool().parallel_for_2d(
            0,
            fragment_num,
            0,
            range_num,
            |f, r| {
                let range = self.range(r);
                Ok(self.array.fragments()[f as usize]
                    .metadata()
                    .rtree()
                    .get_tile_overlap(&range))
            },
        );

        let mut tile_overlap = Vec::with_capacity(fragment_num as usize);
        for row in statuses {
            tile_overlap.push(collect_statuses(row)?);
        }

        self.tile_overlap = tile_overlap;
        self.tile_overlap_computed = true;
        Ok(())
    }

    /// The `[fragment][range_index]` overlap matrix. Empty until
    /// [Subarray::compute_tile_overlap] runs.
    pub fn tile_overlap(&self) -> &[Vec<TileOverlap>] {
        &self.tile_overlap
    }

    pub fn tile_overlap_computed(&self) -> bool {
        self.tile_overlap_computed
    }
}
