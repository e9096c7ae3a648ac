use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tile::{ResourceNode, Tile};
use crate::CHUNK_SIZE;

/// A `CHUNK_SIZE` x `CHUNK_SIZE` region of tiles, indexed by chunk
/// coordinates. `tiles` is flat, row-major by local `(x, y)`; every tile
/// carries its own absolute world coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub cx: i64,
    pub cy: i64,
    pub tiles: Vec<Tile>,
}

impl Chunk {
    #[must_use]
    pub fn origin(&self) -> (i64, i64) {
        (self.cx * CHUNK_SIZE as i64, self.cy * CHUNK_SIZE as i64)
    }

    #[must_use]
    pub fn local_index(lx: usize, ly: usize) -> usize { ly * CHUNK_SIZE + lx }

    #[must_use]
    pub fn tile_at(&self, lx: usize, ly: usize) -> Option<&Tile> { self.tiles.get(Self::local_index(lx, ly)) }

    pub fn tile_at_mut(&mut self, lx: usize, ly: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(Self::local_index(lx, ly))
    }

    /// Looks up a tile by its absolute world coordinate, if it falls inside
    /// this chunk's rectangle.
    #[must_use]
    pub fn tile_at_world(&self, wx: i64, wy: i64) -> Option<&Tile> {
        let (ox, oy) = self.origin();
        let lx = wx - ox;
        let ly = wy - oy;
        if (0..CHUNK_SIZE as i64).contains(&lx) && (0..CHUNK_SIZE as i64).contains(&ly) {
            self.tile_at(lx as usize, ly as usize)
        } else {
            None
        }
    }

    pub fn tile_at_world_mut(&mut self, wx: i64, wy: i64) -> Option<&mut Tile> {
        let (ox, oy) = self.origin();
        let lx = wx - ox;
        let ly = wy - oy;
        if (0..CHUNK_SIZE as i64).contains(&lx) && (0..CHUNK_SIZE as i64).contains(&ly) {
            self.tile_at_mut(lx as usize, ly as usize)
        } else {
            None
        }
    }

    /// Reconstructs the `{"wx,wy": ResourceNode}` map the wire protocol
    /// sends alongside `tiles`, from the tiles themselves.
    #[must_use]
    pub fn resource_map(&self) -> HashMap<String, ResourceNode> {
        self.tiles
            .iter()
            .filter_map(|t| t.r.as_ref().map(|r| (format!("{},{}", t.x, t.y), r.clone())))
            .collect()
    }
}

/// Key used by the in-flight registry, worker-local LRU, and shared cache:
/// `"cx,cy"`.
#[must_use]
pub fn chunk_key(cx: i64, cy: i64) -> String { format!("{cx},{cy}") }
