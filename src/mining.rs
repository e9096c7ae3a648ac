//! Mining subsystem (component H): mutates resource `remaining` in place,
//! writes through the persistent store, and invalidates the chunk.

use crate::error::ChunkError;
use crate::persistence::Store;
use crate::players::Hub;
use crate::terrain::tile::ResourceType;
use crate::CHUNK_SIZE;

#[must_use]
pub fn tool_efficiency(tool: &str) -> f64 {
    match tool {
        "pickaxe" => 0.6,
        "drill" => 0.9,
        _ => 0.2, // "hand", and any unrecognized tool
    }
}

pub struct MiningResult {
    pub resource_type: ResourceType,
    pub amount: u32,
    pub x: i64,
    pub y: i64,
}

/// Resolves `(x, y)` to its containing chunk, mines the resource there if
/// present, persists the mutation, and invalidates the chunk. Returns
/// [`ChunkError::MiningMiss`] for any of: chunk not yet generated, no tile
/// at that point, no resource on the tile, or an already-depleted
/// resource.
pub async fn mine(store: &Store, hub: &Hub, x: i64, y: i64, tool: &str) -> Result<MiningResult, ChunkError> {
    let size = CHUNK_SIZE as i64;
    let cx = x.div_euclid(size);
    let cy = y.div_euclid(size);

    let mut chunk = store.read(cx, cy).await?.ok_or(ChunkError::MiningMiss)?;

    let tile = chunk.tile_at_world_mut(x, y).ok_or(ChunkError::MiningMiss)?;
    let resource = tile.r.as_mut().ok_or(ChunkError::MiningMiss)?;

    if resource.remaining == 0 {
        return Err(ChunkError::MiningMiss);
    }

    let efficiency = (tool_efficiency(tool) - resource.hardness).max(0.1);
    let mined = ((resource.remaining as f64 * efficiency * 0.1).floor() as u32).max(1).min(resource.remaining);

    resource.remaining = resource.remaining.saturating_sub(mined);
    let resource_type = resource.kind;

    store.write(&chunk).await?;
    hub.invalidate_chunk(cx, cy).await;

    Ok(MiningResult {
        resource_type,
        amount: mined,
        x,
        y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_efficiency_matches_the_declared_table() {
        assert!((tool_efficiency("hand") - 0.2).abs() < f64::EPSILON);
        assert!((tool_efficiency("pickaxe") - 0.6).abs() < f64::EPSILON);
        assert!((tool_efficiency("drill") - 0.9).abs() < f64::EPSILON);
        assert!((tool_efficiency("bare-hands") - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn mined_amount_is_never_below_one_and_never_exceeds_remaining() {
        let remaining: u32 = 3;
        let efficiency = 0.9_f64 - 0.05;
        let mined = ((f64::from(remaining) * efficiency * 0.1).floor() as u32).max(1).min(remaining);
        assert!(mined >= 1);
        assert!(mined <= remaining);
    }
}
