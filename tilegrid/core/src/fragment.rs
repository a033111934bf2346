//! Fragments: atomic, append-only units of written data.
//!
//! A fragment's metadata (tile bounding rectangles, per-tile sizes, and
//! the R-tree over the rectangles) is immutable after the fragment is
//! opened and may be read concurrently by any number of submissions.

use std::collections::HashMap;

use tilegrid_common::filter::CompressionData;
use tilegrid_common::range::MinimumBoundingRectangle;

use crate::codec;
use crate::error::{Error, Result};
use crate::rtree::{RTree, DEFAULT_FANOUT};

/// Per-tile bookkeeping a fragment exposes to the read path.
#[derive(Debug)]
pub struct FragmentMetadata {
    dense: bool,
    cells_per_tile: Vec<u64>,
    /// Per field, the size in bytes of each tile's fixed part.
    fixed_tile_sizes: HashMap<String, Vec<u64>>,
    /// Per variable-length field, the size in bytes of each tile's
    /// var part.
    var_tile_sizes: HashMap<String, Vec<u64>>,
    rtree: RTree,
    non_empty_domain: Option<MinimumBoundingRectangle>,
}

impl FragmentMetadata {
    pub(crate) fn new(
        dense: bool,
        mbrs: Vec<MinimumBoundingRectangle>,
        cells_per_tile: Vec<u64>,
        fixed_tile_sizes: HashMap<String, Vec<u64>>,
        var_tile_sizes: HashMap<String, Vec<u64>>,
    ) -> Self {
        let non_empty_domain = mbrs.split_first().map(|(first, rest)| {
            rest.iter().fold(first.clone(), |acc, mbr| {
                acc.iter()
                    .zip(mbr.iter())
                    .map(|(l, r)| l.union(r))
                    .collect()
            })
        });
        FragmentMetadata {
            dense,
            cells_per_tile,
            fixed_tile_sizes,
            var_tile_sizes,
            rtree: RTree::new(DEFAULT_FANOUT, mbrs),
            non_empty_domain,
        }
    }

    pub fn is_dense(&self) -> bool {
        self.dense
    }

    pub fn tile_num(&self) -> u64 {
        self.rtree.leaf_num()
    }

    /// Iterates the fragment's tile ids.
    pub fn tile_ids(&self) -> impl Iterator<Item = u64> {
        0..self.tile_num()
    }

    pub fn cells_in_tile(&self, tile_id: u64) -> Result<u64> {
        self.cells_per_tile.get(tile_id as usize).copied().ok_or_else(
            || Error::Internal(format!("no such tile: {tile_id}")),
        )
    }

    /// The size in bytes of the fixed part of a field's tile. For a
    /// variable-length field this is the size of its offsets records.
    pub fn tile_size(&self, field: &str, tile_id: u64) -> Result<u64> {
        self.fixed_tile_sizes
            .get(field)
            .and_then(|sizes| sizes.get(tile_id as usize))
            .copied()
            .ok_or_else(|| {
                Error::Internal(format!(
                    "no tile size for field '{field}' tile {tile_id}"
                ))
            })
    }

    /// The size in bytes of the var part of a variable-length field's
    /// tile.
    pub fn tile_var_size(&self, field: &str, tile_id: u64) -> Result<u64> {
        self.var_tile_sizes
            .get(field)
            .and_then(|sizes| sizes.get(tile_id as usize))
            .copied()
            .ok_or_else(|| {
                Error::Internal(format!(
                    "no var tile size for field '{field}' tile {tile_id}"
                ))
            })
    }

    pub fn rtree(&self) -> &RTree {
        &self.rtree
    }

    pub fn mbr(&self, tile_id: u64) -> Result<&MinimumBoundingRectangle> {
        self.rtree.leaf(tile_id).ok_or_else(|| {
            Error::Internal(format!("no such tile: {tile_id}"))
        })
    }

    pub fn non_empty_domain(&self) -> Option<&MinimumBoundingRectangle> {
        self.non_empty_domain.as_ref()
    }
}

/// One tile of one field as stored: data bytes behind the field's
/// codec, plus per-cell byte offsets for variable-length fields.
#[derive(Debug)]
pub(crate) struct StoredTile {
    compression: Option<CompressionData>,
    data: Vec<u8>,
    offsets: Vec<u64>,
}

/// One tile of one field with its data bytes decoded.
#[derive(Debug)]
pub(crate) struct TilePayload {
    pub data: Vec<u8>,
    pub offsets: Vec<u64>,
}

impl TilePayload {
    /// The bytes of the fixed-size cell at `pos`.
    pub fn fixed_cell(&self, pos: u64, cell_size: u64) -> &[u8] {
        let start = (pos * cell_size) as usize;
        &self.data[start..start + cell_size as usize]
    }

    /// The bytes of the variable-length cell at `pos`.
    pub fn var_cell(&self, pos: u64) -> &[u8] {
        let start = self.offsets[pos as usize] as usize;
        let end = self
            .offsets
            .get(pos as usize + 1)
            .map(|off| *off as usize)
            .unwrap_or(self.data.len());
        &self.data[start..end]
    }
}

/// The tile payloads of one fragment, keyed by field name and indexed
/// by tile id.
#[derive(Debug, Default)]
pub(crate) struct FragmentData {
    tiles: HashMap<String, Vec<StoredTile>>,
}

impl FragmentData {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores a field's tiles, compressing each through the field's
    /// codec.
    pub fn insert_field(
        &mut self,
        field: &str,
        compression: Option<CompressionData>,
        tiles: Vec<(Vec<u8>, Vec<u64>)>,
    ) -> Result<()> {
        let mut stored = Vec::with_capacity(tiles.len());
        for (raw, offsets) in tiles {
            let data = match compression.as_ref() {
                Some(compression) => codec::compress(compression, &raw)?,
                None => raw,
            };
            stored.push(StoredTile {
                compression,
                data,
                offsets,
            });
        }
        self.tiles.insert(field.to_owned(), stored);
        Ok(())
    }

    /// Decodes the tile `tile_id` of `field`.
    pub fn tile(&self, field: &str, tile_id: u64) -> Result<TilePayload> {
        let stored = self
            .tiles
            .get(field)
            .and_then(|tiles| tiles.get(tile_id as usize))
            .ok_or_else(|| {
                Error::Internal(format!(
                    "no stored tile for field '{field}' tile {tile_id}"
                ))
            })?;
        let data = match stored.compression.as_ref() {
            Some(compression) => {
                codec::decompress(compression.kind, &stored.data)?
            }
            None => stored.data.clone(),
        };
        Ok(TilePayload {
            data,
            offsets: stored.offsets.clone(),
        })
    }
}

/// An atomic unit of written data; an array is the logical union of
/// its fragments in creation order.
#[derive(Debug)]
pub struct Fragment {
    pub(crate) metadata: FragmentMetadata,
    pub(crate) data: FragmentData,
}

impl Fragment {
    pub fn metadata(&self) -> &FragmentMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use tilegrid_common::filter::CompressionType;
    use tilegrid_common::range::SingleValueRange;

    use super::*;

    #[test]
    fn tile_sizes_by_field() {
        let mbrs = vec![
            vec![SingleValueRange::UInt64(1, 2)],
            vec![SingleValueRange::UInt64(3, 4)],
        ];
        let metadata = FragmentMetadata::new(
            false,
            mbrs,
            vec![2, 2],
            HashMap::from([
                ("a1".to_owned(), vec![8, 8]),
                ("a2".to_owned(), vec![16, 16]),
            ]),
            HashMap::from([("a2".to_owned(), vec![5, 7])]),
        );

        assert_eq!(2, metadata.tile_num());
        assert_eq!(8, metadata.tile_size("a1", 0).unwrap());
        assert_eq!(16, metadata.tile_size("a2", 1).unwrap());
        assert_eq!(7, metadata.tile_var_size("a2", 1).unwrap());
        assert!(metadata.tile_var_size("a1", 0).is_err());
        assert!(metadata.tile_size("a1", 2).is_err());
        assert_eq!(
            Some(&vec![SingleValueRange::UInt64(1, 4)]),
            metadata.non_empty_domain()
        );
    }

    #[test]
    fn stored_tiles_roundtrip_through_codec() {
        let mut data = FragmentData::new();
        let raw = b"abbcccdddd".to_vec();
        let offsets = vec![0u64, 1, 3, 6];
        data.insert_field(
            "a2",
            Some(CompressionData::new(CompressionType::Gzip)),
            vec![(raw.clone(), offsets.clone())],
        )
        .unwrap();

        let payload = data.tile("a2", 0).unwrap();
        assert_eq!(raw, payload.data);
        assert_eq!(b"a", payload.var_cell(0));
        assert_eq!(b"bb", payload.var_cell(1));
        assert_eq!(b"ccc", payload.var_cell(2));
        assert_eq!(b"dddd", payload.var_cell(3));
    }
}
