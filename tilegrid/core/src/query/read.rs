//! The incremental read driver.
//!
//! Each submission walks the subarray's ranges in layout order from
//! the persisted cursor, materializing one range's cells at a time and
//! packing them into the caller's buffers. The cursor advances only
//! after a cell has been fully written to every configured buffer, so
//! results across successive submissions concatenate to exactly the
//! single-shot sequence.

use std::collections::HashMap;

use itertools::Itertools;

use tilegrid_common::array::CellOrder;
use tilegrid_common::query::QueryStatus;

use crate::array::Array;
use crate::constants;
use crate::error::{Error, Result};
use crate::fragment::TilePayload;
use crate::order::{self, GlobalCmp, TileGrid};
use crate::query::buffers::QueryBuffers;
use crate::subarray::Subarray;

/// The location of one result cell's values within a fragment.
#[derive(Clone, Copy, Debug)]
struct CellAddr {
    fragment: usize,
    tile: u64,
    pos: u64,
}

/// The driver's cursor and scratch: which range is current, how many
/// of its cells have been emitted, and decoded tiles kept across
/// submissions.
#[derive(Default)]
pub(crate) struct ReadState {
    planned: bool,
    range_idx: u64,
    cell_offset: usize,
    current_run: Option<Vec<CellAddr>>,
    tile_cache: HashMap<(usize, String, u64), TilePayload>,
}

fn tile_payload<'c>(
    cache: &'c mut HashMap<(usize, String, u64), TilePayload>,
    array: &Array,
    field: &str,
    fragment: usize,
    tile: u64,
) -> Result<&'c TilePayload> {
    let key = (fragment, field.to_owned(), tile);
    if !cache.contains_key(&key) {
        let payload = array.fragments()[fragment].data.tile(field, tile)?;
        cache.insert(key.clone(), payload);
    }
    Ok(&cache[&key])
}

/// Runs one read submission to completion or to the first cell which
/// does not fit.
pub(crate) fn submit_read(
    array: &Array,
    layout: CellOrder,
    subarray: &mut Subarray,
    buffers: &mut QueryBuffers,
    state: &mut ReadState,
) -> Result<QueryStatus> {
    if !state.planned {
        subarray.compute_tile_overlap()?;
        state.planned = true;
    }
    let subarray = &*subarray;

    buffers.reset_lengths();

    let schema = array.schema();
    let grid = if schema.is_dense() {
        Some(TileGrid::new(schema)?)
    } else {
        None
    };

    let range_num = subarray.range_num();
    while state.range_idx < range_num {
        let run = match state.current_run.take() {
            Some(run) => run,
            None => build_run(
                array,
                subarray,
                layout,
                grid.as_ref(),
                state.range_idx,
                &mut state.tile_cache,
            )?,
        };

        while state.cell_offset < run.len() {
            let addr = run[state.cell_offset];

            // gather the byte cost of this cell per configured buffer
            let mut lengths = Vec::with_capacity(buffers.len());
            for (name, buffer) in buffers.iter() {
                let len = if buffer.is_var() {
                    let payload = tile_payload(
                        &mut state.tile_cache,
                        array,
                        name,
                        addr.fragment,
                        addr.tile,
                    )?;
                    payload.var_cell(addr.pos).len() as u64
                } else {
                    schema.cell_size(name)?.ok_or_else(|| {
                        Error::Internal(format!(
                            "field '{name}' has no fixed cell size"
                        ))
                    })?
                };
                lengths.push(len);
            }

            let all_fit = buffers
                .iter()
                .zip(lengths.iter())
                .all(|((_, buffer), len)| buffer.fits(*len));

            if !all_fit {
                if buffers.all_empty() {
                    // a var cell which cannot fit even into empty
                    // buffers can never be delivered
                    let unsplittable = buffers
                        .iter()
                        .zip(lengths.iter())
                        .find(|((_, buffer), len)| {
                            buffer.is_var() && !buffer.fits_when_empty(**len)
                        });
                    if let Some(((name, _), len)) = unsplittable {
                        let name = name.clone();
                        state.current_run = Some(run);
                        return Err(Error::BufferOverflow(format!(
                            "a {len}-byte cell of field '{name}' exceeds the buffer capacity"
                        )));
                    }
                }
                tracing::trace!(
                    range_idx = state.range_idx,
                    cell_offset = state.cell_offset,
                    "buffers full, pausing read"
                );
                state.current_run = Some(run);
                return Ok(QueryStatus::Incomplete);
            }

            for (idx, entry) in buffers.iter_mut().enumerate() {
                let (name, buffer) = (&entry.0, &mut entry.1);
                let payload = tile_payload(
                    &mut state.tile_cache,
                    array,
                    name,
                    addr.fragment,
                    addr.tile,
                )?;
                if buffer.is_var() {
                    buffer.append(payload.var_cell(addr.pos));
                } else {
                    buffer.append(payload.fixed_cell(addr.pos, lengths[idx]));
                }
            }
            state.cell_offset += 1;
        }

        state.range_idx += 1;
        state.cell_offset = 0;
    }

    tracing::trace!(range_num, "read complete");
    Ok(QueryStatus::Completed)
}

/// The order in which a range's cells are delivered.
fn result_cell_order(schema_order: CellOrder, layout: CellOrder) -> CellOrder {
    match layout {
        CellOrder::Unordered => schema_order,
        other => other,
    }
}

fn build_run(
    array: &Array,
    subarray: &Subarray,
    layout: CellOrder,
    grid: Option<&TileGrid>,
    range_idx: u64,
    cache: &mut HashMap<(usize, String, u64), TilePayload>,
) -> Result<Vec<CellAddr>> {
    match grid {
        Some(grid) => build_dense_run(array, subarray, layout, grid, range_idx),
        None => build_sparse_run(array, subarray, layout, range_idx, cache),
    }
}

/// Dense cells are enumerated directly from the selected rectangle in
/// the result order; the grid maps each coordinate onto its tile and
/// in-tile position. The most recent fragment provides the values.
fn build_dense_run(
    array: &Array,
    subarray: &Subarray,
    layout: CellOrder,
    grid: &TileGrid,
    range_idx: u64,
) -> Result<Vec<CellAddr>> {
    let fragment = match array.fragments().iter().rposition(|f| {
        f.metadata().is_dense()
    }) {
        Some(fragment) => fragment,
        None => return Ok(Vec::new()),
    };

    let schema = array.schema();
    let domain = schema.domain().ranges();
    let range = subarray.range(range_idx);

    let bounds = domain
        .iter()
        .zip(range.iter())
        .map(|(d, r)| order::range_to_offsets(d, r))
        .collect::<Result<Vec<[u64; 2]>>>()?;

    let cell_order = result_cell_order(schema.cell_order(), layout);
    let coords_iter: Vec<Vec<u64>> = match cell_order {
        CellOrder::RowMajor => bounds
            .iter()
            .map(|[lo, hi]| (*lo..=*hi).collect::<Vec<u64>>())
            .multi_cartesian_product()
            .collect(),
        CellOrder::ColumnMajor => bounds
            .iter()
            .rev()
            .map(|[lo, hi]| (*lo..=*hi).collect::<Vec<u64>>())
            .multi_cartesian_product()
            .map(|mut coords| {
                coords.reverse();
                coords
            })
            .collect(),
        CellOrder::Global => dense_global_coords(grid, &bounds),
        CellOrder::Unordered => {
            unreachable!("unordered resolves to the schema cell order")
        }
    };

    Ok(coords_iter
        .into_iter()
        .map(|coords| {
            let (tile, pos) = grid.locate(&coords);
            CellAddr {
                fragment,
                tile,
                pos,
            }
        })
        .collect())
}

/// Global order for a dense rectangle: tiles in tile order, and within
/// each tile the rectangle's cells in cell order.
fn dense_global_coords(grid: &TileGrid, bounds: &[[u64; 2]]) -> Vec<Vec<u64>> {
    let mut out = Vec::new();
    for tile_id in 0..grid.tile_num() {
        let tile_coords = grid.tile_coords(tile_id);
        let tile_widths = grid.tile_widths(&tile_coords);

        // intersect the tile's extent with the selection
        let mut clipped = Vec::with_capacity(bounds.len());
        let mut empty = false;
        for (d, [lo, hi]) in bounds.iter().enumerate() {
            let tile_lo = tile_coords[d] * grid.extent(d);
            let tile_hi = tile_lo + tile_widths[d] - 1;
            let lo = (*lo).max(tile_lo);
            let hi = (*hi).min(tile_hi);
            if lo > hi {
                empty = true;
                break;
            }
            clipped.push([lo, hi]);
        }
        if empty {
            continue;
        }

        let cells = match grid.cell_order() {
            CellOrder::ColumnMajor => clipped
                .iter()
                .rev()
                .map(|[lo, hi]| (*lo..=*hi).collect::<Vec<u64>>())
                .multi_cartesian_product()
                .map(|mut coords| {
                    coords.reverse();
                    coords
                })
                .collect::<Vec<Vec<u64>>>(),
            _ => clipped
                .iter()
                .map(|[lo, hi]| (*lo..=*hi).collect::<Vec<u64>>())
                .multi_cartesian_product()
                .collect::<Vec<Vec<u64>>>(),
        };
        out.extend(cells);
    }
    out
}

/// Sparse cells are collected through the precomputed tile overlap:
/// every cell of a fully-contained tile qualifies, cells of partially
/// overlapping tiles are filtered by coordinate, and the result is
/// sorted into the requested order.
fn build_sparse_run(
    array: &Array,
    subarray: &Subarray,
    layout: CellOrder,
    range_idx: u64,
    cache: &mut HashMap<(usize, String, u64), TilePayload>,
) -> Result<Vec<CellAddr>> {
    let schema = array.schema();
    let datatype = schema.domain().datatype();
    let coords_size = schema.coords_cell_size();
    let range = subarray.range(range_idx);

    let mut cells: Vec<(Vec<u8>, CellAddr)> = Vec::new();
    for (f, fragment) in array.fragments().iter().enumerate() {
        let meta = fragment.metadata();
        let overlap = &subarray.tile_overlap()[f][range_idx as usize];

        let mut collect_tile = |cache: &mut HashMap<_, _>,
                                tile: u64,
                                filter: bool|
         -> Result<()> {
            let payload =
                tile_payload(cache, array, constants::COORDS, f, tile)?;
            let cell_num = meta.cells_in_tile(tile)?;
            for pos in 0..cell_num {
                let coords = payload.fixed_cell(pos, coords_size);
                if filter
                    && !order::coords_in_ranges(datatype, &range, coords)
                {
                    continue;
                }
                cells.push((
                    coords.to_vec(),
                    CellAddr {
                        fragment: f,
                        tile,
                        pos,
                    },
                ));
            }
            Ok(())
        };

        for tile_range in overlap.tile_ranges.iter() {
            for tile in tile_range[0]..=tile_range[1] {
                collect_tile(cache, tile, false)?;
            }
        }
        for (tile, _ratio) in overlap.tiles.iter() {
            collect_tile(cache, *tile, true)?;
        }
    }

    // cells were collected fragment-by-fragment in tile order, so a
    // stable sort keeps that as the tie-break for duplicates
    let dim_num = schema.dim_num();
    match result_cell_order(schema.cell_order(), layout) {
        CellOrder::Global => {
            let global = GlobalCmp::new(schema)?;
            cells.sort_by(|(a, _), (b, _)| global.cmp(a, b));
        }
        cell_order => {
            cells.sort_by(|(a, _), (b, _)| {
                order::cmp_cell_coords(datatype, dim_num, cell_order, a, b)
            });
        }
    }

    Ok(cells.into_iter().map(|(_, addr)| addr).collect())
}
