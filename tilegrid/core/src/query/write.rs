//! The write path: turning fully-populated caller buffers into one
//! fragment per write query.
//!
//! Dense writes are global-order only: the caller supplies every cell
//! of the domain in tile order, cells within a tile in cell order.
//! Sparse writes carry explicit coordinates; unordered input is sorted
//! into the global order before tiling by the schema capacity.

use std::collections::HashMap;

use tilegrid_common::array::{ArrayType, CellOrder};
use tilegrid_common::datatype::{Datatype, PhysicalType};
use tilegrid_common::physical_type_go;
use tilegrid_common::range::{MinimumBoundingRectangle, SingleValueRange};

use crate::array::Array;
use crate::constants;
use crate::error::{Error, Result};
use crate::fragment::{Fragment, FragmentData, FragmentMetadata};
use crate::order::{self, GlobalCmp, TileGrid};

/// One field's caller-supplied write buffers.
#[derive(Clone, Debug)]
pub(crate) struct WriteData {
    pub data: Vec<u8>,
    pub offsets: Option<Vec<u64>>,
}

pub(crate) fn submit_write(
    array: &Array,
    layout: CellOrder,
    write_data: &HashMap<String, WriteData>,
) -> Result<Fragment> {
    validate_fields(array, write_data)?;
    match array.schema().array_type() {
        ArrayType::Dense => write_dense(array, layout, write_data),
        ArrayType::Sparse => write_sparse(array, layout, write_data),
    }
}

fn validate_fields(
    array: &Array,
    write_data: &HashMap<String, WriteData>,
) -> Result<()> {
    let schema = array.schema();
    for name in write_data.keys() {
        if name == constants::COORDS {
            if schema.is_dense() {
                return Err(Error::InvalidArgument(
                    "dense writes do not take coordinates".to_owned(),
                ));
            }
            continue;
        }
        if schema.attribute(name).is_none() {
            return Err(Error::InvalidArgument(format!(
                "no such attribute: '{name}'"
            )));
        }
    }
    for attribute in schema.attributes() {
        if !write_data.contains_key(&attribute.name) {
            return Err(Error::InvalidArgument(format!(
                "write is missing a buffer for attribute '{}'",
                attribute.name
            )));
        }
    }
    Ok(())
}

fn validate_offsets(
    name: &str,
    offsets: &[u64],
    data_len: u64,
    cell_num: u64,
) -> Result<()> {
    if offsets.len() as u64 != cell_num {
        return Err(Error::InvalidArgument(format!(
            "attribute '{name}' expects {cell_num} offsets, found {}",
            offsets.len()
        )));
    }
    if let Some(first) = offsets.first() {
        if *first != 0 {
            return Err(Error::InvalidArgument(format!(
                "attribute '{name}' offsets must start at zero"
            )));
        }
    }
    for window in offsets.windows(2) {
        if window[0] > window[1] {
            return Err(Error::InvalidArgument(format!(
                "attribute '{name}' offsets must be non-decreasing"
            )));
        }
    }
    if let Some(last) = offsets.last() {
        if *last > data_len {
            return Err(Error::InvalidArgument(format!(
                "attribute '{name}' offsets exceed the value buffer"
            )));
        }
    }
    Ok(())
}

/// The byte span of cell `i` in a var-size write buffer.
fn var_cell_bounds(offsets: &[u64], data_len: u64, i: usize) -> (u64, u64) {
    let start = offsets[i];
    let end = offsets.get(i + 1).copied().unwrap_or(data_len);
    (start, end)
}

fn write_dense(
    array: &Array,
    layout: CellOrder,
    write_data: &HashMap<String, WriteData>,
) -> Result<Fragment> {
    if !matches!(layout, CellOrder::Global) {
        return Err(Error::InvalidArgument(
            "dense writes must use the global-order layout".to_owned(),
        ));
    }

    let schema = array.schema();
    let grid = TileGrid::new(schema)?;
    let total_cells = grid.domain_cell_num();
    let tile_num = grid.tile_num();

    let mut mbrs = Vec::with_capacity(tile_num as usize);
    let mut cells_per_tile = Vec::with_capacity(tile_num as usize);
    for tile_id in 0..tile_num {
        mbrs.push(grid.tile_mbr(tile_id)?);
        cells_per_tile
            .push(grid.tile_cell_num(&grid.tile_coords(tile_id)));
    }

    let mut data = FragmentData::new();
    let mut fixed_sizes = HashMap::new();
    let mut var_sizes = HashMap::new();

    for attribute in schema.attributes() {
        let name = attribute.name.as_str();
        let input = &write_data[name];
        let mut tiles = Vec::with_capacity(tile_num as usize);
        let mut fixed = Vec::with_capacity(tile_num as usize);

        if let Some(cell_size) = attribute.cell_size() {
            if input.offsets.is_some() {
                return Err(Error::InvalidArgument(format!(
                    "attribute '{name}' is fixed-size and takes no offsets"
                )));
            }
            if input.data.len() as u64 != total_cells * cell_size {
                return Err(Error::InvalidArgument(format!(
                    "attribute '{name}' expects {} bytes, found {}",
                    total_cells * cell_size,
                    input.data.len()
                )));
            }
            let mut consumed = 0u64;
            for cell_num in cells_per_tile.iter() {
                let start = (consumed * cell_size) as usize;
                let end = start + (cell_num * cell_size) as usize;
                tiles.push((input.data[start..end].to_vec(), Vec::new()));
                fixed.push(cell_num * cell_size);
                consumed += cell_num;
            }
        } else {
            let offsets = input.offsets.as_ref().ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "attribute '{name}' is variable-length and requires offsets"
                ))
            })?;
            validate_offsets(
                name,
                offsets,
                input.data.len() as u64,
                total_cells,
            )?;

            let mut var = Vec::with_capacity(tile_num as usize);
            let mut consumed = 0usize;
            for cell_num in cells_per_tile.iter() {
                let cell_num = *cell_num as usize;
                let (tile_start, _) =
                    var_cell_bounds(offsets, input.data.len() as u64, consumed);
                let tile_end = if consumed + cell_num == offsets.len() {
                    input.data.len() as u64
                } else {
                    offsets[consumed + cell_num]
                };
                let rebased = offsets[consumed..consumed + cell_num]
                    .iter()
                    .map(|off| off - tile_start)
                    .collect::<Vec<u64>>();
                tiles.push((
                    input.data[tile_start as usize..tile_end as usize]
                        .to_vec(),
                    rebased,
                ));
                fixed.push(
                    cell_num as u64 * constants::CELL_VAR_OFFSET_SIZE,
                );
                var.push(tile_end - tile_start);
                consumed += cell_num;
            }
            var_sizes.insert(name.to_owned(), var);
        }

        fixed_sizes.insert(name.to_owned(), fixed);
        data.insert_field(name, schema.compression(name), tiles)?;
    }

    tracing::debug!(tile_num, total_cells, "built dense fragment");
    Ok(Fragment {
        metadata: FragmentMetadata::new(
            true,
            mbrs,
            cells_per_tile,
            fixed_sizes,
            var_sizes,
        ),
        data,
    })
}

fn write_sparse(
    array: &Array,
    layout: CellOrder,
    write_data: &HashMap<String, WriteData>,
) -> Result<Fragment> {
    if !matches!(layout, CellOrder::Unordered | CellOrder::Global) {
        return Err(Error::InvalidArgument(
            "sparse writes must be unordered or global-order".to_owned(),
        ));
    }

    let schema = array.schema();
    let coords = write_data.get(constants::COORDS).ok_or_else(|| {
        Error::InvalidArgument(
            "sparse writes require a coordinates buffer".to_owned(),
        )
    })?;
    if coords.offsets.is_some() {
        return Err(Error::InvalidArgument(
            "coordinates are fixed-size and take no offsets".to_owned(),
        ));
    }

    let coords_size = schema.coords_cell_size();
    if coords.data.len() as u64 % coords_size != 0 {
        return Err(Error::InvalidArgument(format!(
            "coordinates buffer is not a multiple of the {coords_size}-byte record"
        )));
    }
    let cell_num = coords.data.len() as u64 / coords_size;

    // sort the cells into global order; already-sorted input is the
    // identity permutation
    let global = GlobalCmp::new(schema)?;
    let coord_cell = |i: usize| {
        let start = i * coords_size as usize;
        &coords.data[start..start + coords_size as usize]
    };
    let mut perm = (0..cell_num as usize).collect::<Vec<usize>>();
    perm.sort_by(|a, b| global.cmp(coord_cell(*a), coord_cell(*b)));

    let capacity = schema.capacity() as usize;
    let datatype = schema.domain().datatype();
    let dim_num = schema.dim_num();

    let mut mbrs: Vec<MinimumBoundingRectangle> = Vec::new();
    let mut cells_per_tile = Vec::new();
    let mut coords_tiles = Vec::new();
    for chunk in perm.chunks(capacity) {
        let gathered =
            chunk.iter().map(|i| coord_cell(*i)).collect::<Vec<&[u8]>>();
        mbrs.push(sparse_mbr(datatype, dim_num, &gathered));
        cells_per_tile.push(chunk.len() as u64);
        let mut tile = Vec::with_capacity(chunk.len() * coords_size as usize);
        for cell in gathered {
            tile.extend_from_slice(cell);
        }
        coords_tiles.push((tile, Vec::new()));
    }

    let mut data = FragmentData::new();
    let mut fixed_sizes = HashMap::new();
    let mut var_sizes = HashMap::new();

    fixed_sizes.insert(
        constants::COORDS.to_owned(),
        cells_per_tile
            .iter()
            .map(|n| n * coords_size)
            .collect::<Vec<u64>>(),
    );
    data.insert_field(constants::COORDS, None, coords_tiles)?;

    for attribute in schema.attributes() {
        let name = attribute.name.as_str();
        let input = &write_data[name];
        let mut tiles = Vec::new();
        let mut fixed = Vec::new();

        if let Some(cell_size) = attribute.cell_size() {
            if input.offsets.is_some() {
                return Err(Error::InvalidArgument(format!(
                    "attribute '{name}' is fixed-size and takes no offsets"
                )));
            }
            if input.data.len() as u64 != cell_num * cell_size {
                return Err(Error::InvalidArgument(format!(
                    "attribute '{name}' expects {} bytes, found {}",
                    cell_num * cell_size,
                    input.data.len()
                )));
            }
            for chunk in perm.chunks(capacity) {
                let mut tile =
                    Vec::with_capacity(chunk.len() * cell_size as usize);
                for i in chunk {
                    let start = i * cell_size as usize;
                    tile.extend_from_slice(
                        &input.data[start..start + cell_size as usize],
                    );
                }
                fixed.push(chunk.len() as u64 * cell_size);
                tiles.push((tile, Vec::new()));
            }
        } else {
            let offsets = input.offsets.as_ref().ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "attribute '{name}' is variable-length and requires offsets"
                ))
            })?;
            validate_offsets(
                name,
                offsets,
                input.data.len() as u64,
                cell_num,
            )?;

            let mut var = Vec::new();
            for chunk in perm.chunks(capacity) {
                let mut tile = Vec::new();
                let mut rebased = Vec::with_capacity(chunk.len());
                for i in chunk {
                    let (start, end) = var_cell_bounds(
                        offsets,
                        input.data.len() as u64,
                        *i,
                    );
                    rebased.push(tile.len() as u64);
                    tile.extend_from_slice(
                        &input.data[start as usize..end as usize],
                    );
                }
                fixed.push(
                    chunk.len() as u64 * constants::CELL_VAR_OFFSET_SIZE,
                );
                var.push(tile.len() as u64);
                tiles.push((tile, rebased));
            }
            var_sizes.insert(name.to_owned(), var);
        }

        fixed_sizes.insert(name.to_owned(), fixed);
        data.insert_field(name, schema.compression(name), tiles)?;
    }

    tracing::debug!(
        cell_num,
        tile_num = cells_per_tile.len(),
        "built sparse fragment"
    );
    Ok(Fragment {
        metadata: FragmentMetadata::new(
            false,
            mbrs,
            cells_per_tile,
            fixed_sizes,
            var_sizes,
        ),
        data,
    })
}

/// The bounding rectangle of a tile's gathered coordinate records.
fn sparse_mbr(
    datatype: Datatype,
    dim_num: usize,
    cells: &[&[u8]],
) -> MinimumBoundingRectangle {
    let value_size = datatype.size();
    (0..dim_num)
        .map(|d| {
            let at = d * value_size;
            let mut min = &cells[0][at..at + value_size];
            let mut max = min;
            for cell in cells.iter().skip(1) {
                let value = &cell[at..at + value_size];
                if order::cmp_dim(datatype, value, min).is_lt() {
                    min = value;
                }
                if order::cmp_dim(datatype, value, max).is_gt() {
                    max = value;
                }
            }
            physical_type_go!(datatype, DT, {
                SingleValueRange::from(&[
                    DT::read_le(min),
                    DT::read_le(max),
                ])
            })
        })
        .collect()
}
