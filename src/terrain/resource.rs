use rand::{rngs::StdRng, Rng, SeedableRng};

use super::biome::{
    biome_profile, is_forest_biome, resource_amount_range, resource_hardness_range,
    resource_respawn_range, MAX_DENSITY_MULTIPLIER, MIN_PLACEMENTS,
};
use super::tile::{ResourceNode, ResourceType, Tile};
use crate::{STEEP_CUTOFF, STEEP_HARDNESS_CUTOFF, STEEP_HARDNESS_DIFFICULTY};

/// Combines `(seed, wx, wy)` into a well-distributed 64-bit seed so every
/// cell gets its own independent deterministic RNG stream — never shared
/// across cells or chunks. A splitmix64 finalizer, not cryptographic, just
/// decorrelated enough that neighbouring cells don't look lockstep.
fn cell_seed(seed: u32, wx: i64, wy: i64) -> u64 {
    let mut h = u64::from(seed) ^ 0x9E37_79B9_7F4A_7C15;
    h = h.wrapping_add((wx as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    h = h.wrapping_add((wy as u64).wrapping_mul(0x94D0_49BB_1331_11EB));
    h ^= h >> 30;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    h
}

fn cell_rng(seed: u32, wx: i64, wy: i64) -> StdRng { StdRng::seed_from_u64(cell_seed(seed, wx, wy)) }

fn draw_type(rng: &mut StdRng, table: &[(ResourceType, f64)]) -> ResourceType {
    let total: f64 = table.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen::<f64>() * total;

    for (kind, weight) in table {
        if roll < *weight {
            return *kind;
        }
        roll -= weight;
    }

    table.last().map_or(ResourceType::Wood, |(kind, _)| *kind)
}

fn make_resource(
    rng: &mut StdRng,
    kind: ResourceType,
    amount_multiplier: f64,
    wx: i64,
    wy: i64,
    stp: f64,
) -> ResourceNode {
    let (amin, amax) = resource_amount_range(kind);
    let amount = ((rng.gen_range(amin..=amax) as f64) * amount_multiplier)
        .floor()
        .max(1.0) as u32;

    let (hmin, hmax) = resource_hardness_range(kind);
    let mut hardness = rng.gen_range(hmin..=hmax);
    if stp > STEEP_HARDNESS_CUTOFF {
        hardness += STEEP_HARDNESS_DIFFICULTY;
    }

    let respawn_time = resource_respawn_range(kind).map(|(lo, hi)| rng.gen_range(lo..=hi));

    ResourceNode {
        kind,
        amount,
        remaining: amount,
        hardness,
        x: wx,
        y: wy,
        respawn_time,
    }
}

/// LAKE and RIVER tiles always carry a Water resource.
#[must_use]
pub fn place_water_resource(seed: u32, wx: i64, wy: i64) -> ResourceNode {
    let mut rng = cell_rng(seed, wx, wy);
    make_resource(&mut rng, ResourceType::Water, 1.0, wx, wy, 0.0)
}

/// Resolves the resource (if any) for one land tile, per the
/// priority-ordered placement rules: forest-family biomes always place,
/// everything else rolls against its biome's density and is capped per
/// chunk by `placed_this_chunk`.
#[must_use]
pub fn place_land_resource(seed: u32, tile: &Tile, placed_this_chunk: &mut usize) -> Option<ResourceNode> {
    if tile.i_c || tile.stp > STEEP_CUTOFF {
        return None;
    }

    let profile = biome_profile(tile.b)?;
    let mut rng = cell_rng(seed, tile.x, tile.y);

    if is_forest_biome(tile.b) {
        let kind = draw_type(&mut rng, profile.table);
        return Some(make_resource(
            &mut rng,
            kind,
            profile.amount_multiplier,
            tile.x,
            tile.y,
            tile.stp,
        ));
    }

    let cap = ((profile.density * MAX_DENSITY_MULTIPLIER).round() as usize).max(MIN_PLACEMENTS);
    if *placed_this_chunk >= cap {
        return None;
    }

    if rng.gen::<f64>() < profile.density {
        *placed_this_chunk += 1;
        let kind = draw_type(&mut rng, profile.table);
        Some(make_resource(
            &mut rng,
            kind,
            profile.amount_multiplier,
            tile.x,
            tile.y,
            tile.stp,
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_seed_is_deterministic() {
        assert_eq!(cell_seed(1, 10, 20), cell_seed(1, 10, 20));
        assert_ne!(cell_seed(1, 10, 20), cell_seed(1, 10, 21));
        assert_ne!(cell_seed(1, 10, 20), cell_seed(2, 10, 20));
    }

    #[test]
    fn draw_type_respects_whitelist() {
        let mut rng = cell_rng(5, 1, 1);
        let table: &[(ResourceType, f64)] = &[(ResourceType::Coal, 1.0)];
        for _ in 0..20 {
            assert_eq!(draw_type(&mut rng, table), ResourceType::Coal);
        }
    }
}
