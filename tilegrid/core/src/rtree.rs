//! An R-tree over the minimum bounding rectangles of a fragment's
//! tiles, bulk-loaded at fragment-open time.
//!
//! Leaves are stored in tile-id order and internal levels aggregate
//! runs of `fanout` children, so traversal visits tiles in id order and
//! the overlap output is deterministic for identical inputs.

use tilegrid_common::range::{MinimumBoundingRectangle, SingleValueRange};

/// The number of children aggregated under one internal node.
pub const DEFAULT_FANOUT: usize = 10;

/// The intersection between one query range and one fragment's tile
/// set, decomposed into fully-contained tile-id runs and partially
/// overlapping tiles with coverage ratios.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileOverlap {
    /// Contiguous `[first, last]` tile-id runs whose bounding
    /// rectangles lie fully inside the query range. Sorted, disjoint.
    pub tile_ranges: Vec<[u64; 2]>,
    /// `(tile_id, ratio)` pairs for tiles which partially overlap the
    /// query range; `ratio` is the fraction of the tile's bounding
    /// rectangle volume inside the range, in `(0, 1]`.
    pub tiles: Vec<(u64, f64)>,
}

impl TileOverlap {
    pub fn is_empty(&self) -> bool {
        self.tile_ranges.is_empty() && self.tiles.is_empty()
    }

    fn push_contained(&mut self, first: u64, last: u64) {
        if let Some(prev) = self.tile_ranges.last_mut() {
            if prev[1] + 1 == first {
                prev[1] = last;
                return;
            }
        }
        self.tile_ranges.push([first, last]);
    }
}

enum Relation {
    Disjoint,
    Contained,
    Partial,
}

#[derive(Clone, Debug)]
pub struct RTree {
    fanout: usize,
    /// `levels[0]` holds the leaf rectangles in tile-id order; each
    /// higher level aggregates `fanout` nodes of the level below.
    levels: Vec<Vec<MinimumBoundingRectangle>>,
}

impl RTree {
    pub fn new(fanout: usize, leaves: Vec<MinimumBoundingRectangle>) -> RTree {
        assert!(fanout >= 2, "R-tree fanout must be at least 2");

        let mut levels = vec![leaves];
        while levels
            .last()
            .map(|level| level.len() > 1)
            .unwrap_or(false)
        {
            let below = levels.last().expect("levels is non-empty");
            let level = below
                .chunks(fanout)
                .map(|chunk| {
                    chunk
                        .iter()
                        .skip(1)
                        .fold(chunk[0].clone(), |acc, mbr| mbr_union(&acc, mbr))
                })
                .collect::<Vec<MinimumBoundingRectangle>>();
            levels.push(level);
        }

        RTree { fanout, levels }
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    pub fn leaf_num(&self) -> u64 {
        self.levels[0].len() as u64
    }

    pub fn leaf(&self, tile_id: u64) -> Option<&MinimumBoundingRectangle> {
        self.levels[0].get(tile_id as usize)
    }

    /// Computes the overlap between `range` (one interval per
    /// dimension) and the tile set this tree was built over.
    pub fn get_tile_overlap(
        &self,
        range: &[SingleValueRange],
    ) -> TileOverlap {
        let mut overlap = TileOverlap::default();
        if self.levels[0].is_empty() {
            return overlap;
        }

        let top = self.levels.len() - 1;
        for idx in 0..self.levels[top].len() {
            self.visit(top, idx, range, &mut overlap);
        }
        overlap
    }

    fn visit(
        &self,
        level: usize,
        idx: usize,
        range: &[SingleValueRange],
        overlap: &mut TileOverlap,
    ) {
        let mbr = &self.levels[level][idx];
        match relation(range, mbr) {
            Relation::Disjoint => (),
            Relation::Contained => {
                let (first, last) = self.leaf_span(level, idx);
                overlap.push_contained(first, last);
            }
            Relation::Partial => {
                if level == 0 {
                    let ratio = coverage_ratio(mbr, range);
                    if ratio > 0.0 {
                        overlap.tiles.push((idx as u64, ratio));
                    }
                } else {
                    let start = idx * self.fanout;
                    let end =
                        (start + self.fanout).min(self.levels[level - 1].len());
                    for child in start..end {
                        self.visit(level - 1, child, range, overlap);
                    }
                }
            }
        }
    }

    /// The inclusive leaf-id span covered by the node `(level, idx)`.
    fn leaf_span(&self, level: usize, idx: usize) -> (u64, u64) {
        let width = self.fanout.pow(level as u32);
        let first = idx * width;
        let last = (first + width - 1).min(self.levels[0].len() - 1);
        (first as u64, last as u64)
    }
}

fn mbr_union(
    a: &MinimumBoundingRectangle,
    b: &MinimumBoundingRectangle,
) -> MinimumBoundingRectangle {
    a.iter().zip(b.iter()).map(|(l, r)| l.union(r)).collect()
}

fn relation(
    range: &[SingleValueRange],
    mbr: &MinimumBoundingRectangle,
) -> Relation {
    let mut contained = true;
    for (query, tile) in range.iter().zip(mbr.iter()) {
        if query.intersection(tile).is_none() {
            return Relation::Disjoint;
        }
        if !query.contains_range(tile) {
            contained = false;
        }
    }
    if contained {
        Relation::Contained
    } else {
        Relation::Partial
    }
}

/// The fraction of `mbr`'s volume which lies inside `range`. Volume is
/// the cell count for integral dimensions and the real width for float
/// dimensions; a zero-width float dimension contributes factor 1.
fn coverage_ratio(
    mbr: &MinimumBoundingRectangle,
    range: &[SingleValueRange],
) -> f64 {
    let mut ratio = 1.0f64;
    for (tile, query) in mbr.iter().zip(range.iter()) {
        let Some(inter) = tile.intersection(query) else {
            return 0.0;
        };
        let factor = if tile.is_integral() {
            let inter_cells = inter
                .num_cells()
                .expect("integral interval has a cell count");
            let tile_cells = tile
                .num_cells()
                .expect("integral interval has a cell count");
            inter_cells as f64 / tile_cells as f64
        } else {
            let tile_width = float_width(tile);
            if tile_width == 0.0 {
                1.0
            } else {
                float_width(&inter) / tile_width
            }
        };
        ratio *= factor;
    }
    ratio
}

fn float_width(interval: &SingleValueRange) -> f64 {
    match interval {
        SingleValueRange::Float32(lo, hi) => (hi - lo) as f64,
        SingleValueRange::Float64(lo, hi) => hi - lo,
        _ => unreachable!("float_width on an integral interval"),
    }
}
