//! Coordinate, tile-grid, and cell-order arithmetic.
//!
//! Dense coordinates are manipulated in "offset space": zero-based
//! per-dimension offsets from the domain's lower bound, which keeps the
//! arithmetic free of the domain datatype. Sparse coordinates stay in
//! their typed byte representation and are compared through the
//! physical-type dispatch.

use std::cmp::Ordering;

use num_traits::FromPrimitive;

use tilegrid_common::array::{CellOrder, TileOrder};
use tilegrid_common::datatype::{BitsOrd, Datatype, PhysicalType};
use tilegrid_common::range::{MinimumBoundingRectangle, SingleValueRange};
use tilegrid_common::{physical_type_go, single_value_range_go};

use crate::array::Schema;
use crate::error::{Error, Result};

/// Widening of a physical value to `i128`, for offset arithmetic on
/// integral dimensions. Float values widen to `None`.
trait ToI128 {
    fn to_i128(self) -> Option<i128>;
}

macro_rules! to_i128_integral {
    ($($T:ty),+) => {
        $(
            impl ToI128 for $T {
                fn to_i128(self) -> Option<i128> {
                    Some(i128::from(self))
                }
            }
        )+
    }
}

to_i128_integral!(u8, u16, u32, u64, i8, i16, i32, i64);

impl ToI128 for f32 {
    fn to_i128(self) -> Option<i128> {
        None
    }
}

impl ToI128 for f64 {
    fn to_i128(self) -> Option<i128> {
        None
    }
}

/// Compares two coordinates of `datatype` by their bits.
pub(crate) fn cmp_dim(datatype: Datatype, a: &[u8], b: &[u8]) -> Ordering {
    physical_type_go!(datatype, DT, {
        DT::read_le(a).bits_cmp(&DT::read_le(b))
    })
}

/// Compares two cells' interleaved coordinate records in row-major or
/// column-major order.
pub(crate) fn cmp_cell_coords(
    datatype: Datatype,
    dim_num: usize,
    cell_order: CellOrder,
    a: &[u8],
    b: &[u8],
) -> Ordering {
    let value_size = datatype.size();
    let dims: Box<dyn Iterator<Item = usize>> = match cell_order {
        CellOrder::ColumnMajor => Box::new((0..dim_num).rev()),
        _ => Box::new(0..dim_num),
    };
    for d in dims {
        let at = d * value_size;
        let ord = cmp_dim(
            datatype,
            &a[at..at + value_size],
            &b[at..at + value_size],
        );
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Returns whether the interleaved coordinate record `coords` lies in
/// the rectangle selected by `ranges` (one interval per dimension).
pub(crate) fn coords_in_ranges(
    datatype: Datatype,
    ranges: &[SingleValueRange],
    coords: &[u8],
) -> bool {
    let value_size = datatype.size();
    ranges.iter().enumerate().all(|(d, range)| {
        let at = d * value_size;
        single_value_range_go!(range, DT, lo, hi, {
            let value = DT::read_le(&coords[at..at + value_size]);
            lo.bits_le(&value) && value.bits_le(hi)
        })
    })
}

/// Maps the per-dimension interval `range` onto zero-based offsets from
/// the lower bound of `domain`. Integral dimensions only.
pub(crate) fn range_to_offsets(
    domain: &SingleValueRange,
    range: &SingleValueRange,
) -> Result<[u64; 2]> {
    let domain_lo = interval_lo_i128(domain)?;
    let (range_lo, range_hi) =
        single_value_range_go!(range, _DT, lo, hi, {
            (lo.to_i128(), hi.to_i128())
        });
    match (range_lo, range_hi) {
        (Some(lo), Some(hi)) => {
            Ok([(lo - domain_lo) as u64, (hi - domain_lo) as u64])
        }
        _ => Err(Error::UnsupportedType(
            "offset arithmetic requires an integral dimension".to_owned(),
        )),
    }
}

fn interval_lo_i128(interval: &SingleValueRange) -> Result<i128> {
    single_value_range_go!(interval, _DT, lo, _hi, { lo.to_i128() }).ok_or_else(
        || {
            Error::UnsupportedType(
                "offset arithmetic requires an integral dimension".to_owned(),
            )
        },
    )
}

/// Builds the typed interval `[domain.lo + lo_off, domain.lo + hi_off]`.
pub(crate) fn interval_from_offsets(
    domain: &SingleValueRange,
    lo_off: u64,
    hi_off: u64,
) -> Result<SingleValueRange> {
    let domain_lo = interval_lo_i128(domain)?;
    single_value_range_go!(domain, DT, _lo, _hi, {
        let lo = <DT as FromPrimitive>::from_i128(domain_lo + lo_off as i128);
        let hi = <DT as FromPrimitive>::from_i128(domain_lo + hi_off as i128);
        match (lo, hi) {
            (Some(lo), Some(hi)) => Ok(SingleValueRange::from(&[lo, hi])),
            _ => Err(Error::Internal(
                "tile interval escapes the dimension domain".to_owned(),
            )),
        }
    })
}

/// Row-major or column-major linearization of `coords` over a grid
/// with `widths` cells per dimension.
pub(crate) fn linearize(
    coords: &[u64],
    widths: &[u64],
    row_major: bool,
) -> u64 {
    let mut idx = 0u64;
    if row_major {
        for (c, w) in coords.iter().zip(widths.iter()) {
            idx = idx * w + c;
        }
    } else {
        for (c, w) in coords.iter().zip(widths.iter()).rev() {
            idx = idx * w + c;
        }
    }
    idx
}

pub(crate) fn delinearize(
    mut idx: u64,
    widths: &[u64],
    row_major: bool,
) -> Vec<u64> {
    let mut coords = vec![0u64; widths.len()];
    if row_major {
        for d in (0..widths.len()).rev() {
            coords[d] = idx % widths[d];
            idx /= widths[d];
        }
    } else {
        for d in 0..widths.len() {
            coords[d] = idx % widths[d];
            idx /= widths[d];
        }
    }
    coords
}

/// The tile decomposition of a dense array's domain.
///
/// All arithmetic happens in offset space; the typed domain is only
/// consulted to produce tile bounding rectangles.
#[derive(Clone, Debug)]
pub(crate) struct TileGrid {
    domain: MinimumBoundingRectangle,
    widths: Vec<u64>,
    extents: Vec<u64>,
    tiles_per_dim: Vec<u64>,
    tile_order: TileOrder,
    cell_order: CellOrder,
}

impl TileGrid {
    pub fn new(schema: &Schema) -> Result<TileGrid> {
        let domain = schema.domain().ranges();
        let mut widths = Vec::with_capacity(domain.len());
        let mut extents = Vec::with_capacity(domain.len());
        for (dimension, interval) in
            schema.domain().dimensions().iter().zip(domain.iter())
        {
            let num_cells = interval.num_cells().ok_or_else(|| {
                Error::UnsupportedType(format!(
                    "dimension '{}' is not integral",
                    dimension.name
                ))
            })?;
            if num_cells > u64::MAX as u128 {
                return Err(Error::InvalidArgument(format!(
                    "dimension '{}' domain is too large to tile",
                    dimension.name
                )));
            }
            widths.push(num_cells as u64);
            extents.push(extent_from_constraints(dimension)?);
        }

        let tiles_per_dim = widths
            .iter()
            .zip(extents.iter())
            .map(|(w, e)| w.div_ceil(*e))
            .collect::<Vec<u64>>();

        Ok(TileGrid {
            domain,
            widths,
            extents,
            tiles_per_dim,
            tile_order: schema.tile_order(),
            cell_order: schema.cell_order(),
        })
    }

    pub fn extent(&self, dim_idx: usize) -> u64 {
        self.extents[dim_idx]
    }

    pub fn cell_order(&self) -> CellOrder {
        self.cell_order
    }

    pub fn domain_cell_num(&self) -> u64 {
        self.widths.iter().product()
    }

    pub fn tile_num(&self) -> u64 {
        self.tiles_per_dim.iter().product()
    }

    pub fn tile_coords(&self, tile_id: u64) -> Vec<u64> {
        delinearize(
            tile_id,
            &self.tiles_per_dim,
            matches!(self.tile_order, TileOrder::RowMajor),
        )
    }

    pub fn tile_id(&self, tile_coords: &[u64]) -> u64 {
        linearize(
            tile_coords,
            &self.tiles_per_dim,
            matches!(self.tile_order, TileOrder::RowMajor),
        )
    }

    /// The per-dimension cell counts of a tile, clipped at the domain
    /// boundary.
    pub fn tile_widths(&self, tile_coords: &[u64]) -> Vec<u64> {
        tile_coords
            .iter()
            .enumerate()
            .map(|(d, t)| {
                let lo = t * self.extents[d];
                (self.widths[d] - lo).min(self.extents[d])
            })
            .collect()
    }

    pub fn tile_cell_num(&self, tile_coords: &[u64]) -> u64 {
        self.tile_widths(tile_coords).iter().product()
    }

    /// Locates the tile holding the cell at `cell_off` (offset space)
    /// and the cell's position within that tile's cell order.
    pub fn locate(&self, cell_off: &[u64]) -> (u64, u64) {
        let tile_coords = cell_off
            .iter()
            .zip(self.extents.iter())
            .map(|(c, e)| c / e)
            .collect::<Vec<u64>>();
        let in_tile = cell_off
            .iter()
            .zip(tile_coords.iter().zip(self.extents.iter()))
            .map(|(c, (t, e))| c - t * e)
            .collect::<Vec<u64>>();
        let pos = linearize(
            &in_tile,
            &self.tile_widths(&tile_coords),
            matches!(self.cell_order, CellOrder::RowMajor),
        );
        (self.tile_id(&tile_coords), pos)
    }

    /// The typed bounding rectangle of a tile.
    pub fn tile_mbr(&self, tile_id: u64) -> Result<MinimumBoundingRectangle> {
        let tile_coords = self.tile_coords(tile_id);
        let tile_widths = self.tile_widths(&tile_coords);
        self.domain
            .iter()
            .enumerate()
            .map(|(d, interval)| {
                let lo = tile_coords[d] * self.extents[d];
                interval_from_offsets(interval, lo, lo + tile_widths[d] - 1)
            })
            .collect()
    }
}

fn extent_from_constraints(
    dimension: &tilegrid_common::array::DimensionData,
) -> Result<u64> {
    use tilegrid_common::dimension_constraints_go;

    dimension_constraints_go!(
        &dimension.constraints,
        _DT,
        _range,
        extent,
        {
            match extent {
                Some(extent) => Ok(*extent as u64),
                None => Err(Error::InvalidArgument(format!(
                    "dimension '{}' requires a tile extent",
                    dimension.name
                ))),
            }
        },
        {
            Err(Error::UnsupportedType(format!(
                "dimension '{}' is not integral",
                dimension.name
            )))
        }
    )
}

/// Comparator for the global order of a sparse array: tiles in tile
/// order, cells within a tile in cell order.
pub(crate) struct GlobalCmp {
    datatype: Datatype,
    dim_num: usize,
    domain: MinimumBoundingRectangle,
    extents: Vec<f64>,
    tile_order: TileOrder,
    cell_order: CellOrder,
}

impl GlobalCmp {
    pub fn new(schema: &Schema) -> Result<GlobalCmp> {
        let extents = schema
            .domain()
            .dimensions()
            .iter()
            .map(|d| {
                d.constraints.extent_f64().ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "dimension '{}' requires a tile extent",
                        d.name
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(GlobalCmp {
            datatype: schema.domain().datatype(),
            dim_num: schema.dim_num(),
            domain: schema.domain().ranges(),
            extents,
            tile_order: schema.tile_order(),
            cell_order: schema.cell_order(),
        })
    }

    fn dim_tile_index(&self, d: usize, coords: &[u8]) -> i128 {
        let value_size = self.datatype.size();
        let at = d * value_size;
        let bytes = &coords[at..at + value_size];
        let extent = self.extents[d];
        match &self.domain[d] {
            SingleValueRange::Float32(lo, _) => {
                let value = f32::read_le(bytes);
                (((value - lo) as f64) / extent).floor() as i128
            }
            SingleValueRange::Float64(lo, _) => {
                let value = f64::read_le(bytes);
                ((value - lo) / extent).floor() as i128
            }
            interval => single_value_range_go!(
                interval,
                DT,
                lo,
                _hi,
                {
                    let value = DT::read_le(bytes);
                    let lo = value
                        .to_i128()
                        .zip(lo.to_i128())
                        .map(|(v, lo)| (v - lo) / (extent as i128));
                    // unreachable: the float variants matched above
                    lo.unwrap_or(0)
                }
            ),
        }
    }

    pub fn cmp(&self, a: &[u8], b: &[u8]) -> Ordering {
        let dims: Box<dyn Iterator<Item = usize>> = match self.tile_order {
            TileOrder::ColumnMajor => Box::new((0..self.dim_num).rev()),
            TileOrder::RowMajor => Box::new(0..self.dim_num),
        };
        for d in dims {
            let ord = self
                .dim_tile_index(d, a)
                .cmp(&self.dim_tile_index(d, b));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        cmp_cell_coords(self.datatype, self.dim_num, self.cell_order, a, b)
    }
}
