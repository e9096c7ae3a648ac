use super::tile::{Biome, ResourceType};

/// Minimum number of "other eligible tile" resource placements considered
/// per chunk regardless of biome density.
pub const MIN_PLACEMENTS: usize = 3;

/// Multiplier applied to a biome's density to derive its placement cap:
/// `cap = max(MIN_PLACEMENTS, round(density * MAX_DENSITY_MULTIPLIER))`.
pub const MAX_DENSITY_MULTIPLIER: f64 = 20.0;

/// `(min, max)` inclusive ranges, data-driven rather than hard-coded at
/// each call site — the classifier only ever consults these tables.
#[must_use]
pub fn resource_amount_range(kind: ResourceType) -> (u32, u32) {
    match kind {
        ResourceType::Water => (500, 2000),
        ResourceType::Wood => (20, 80),
        ResourceType::Coal => (10, 50),
        ResourceType::Iron => (5, 30),
    }
}

#[must_use]
pub fn resource_hardness_range(kind: ResourceType) -> (f64, f64) {
    match kind {
        ResourceType::Water => (0.0, 0.1),
        ResourceType::Wood => (0.1, 0.3),
        ResourceType::Coal => (0.3, 0.5),
        ResourceType::Iron => (0.5, 0.7),
    }
}

/// `respawnTime` range in seconds; absent entirely for [`ResourceType::Water`].
#[must_use]
pub fn resource_respawn_range(kind: ResourceType) -> Option<(u32, u32)> {
    match kind {
        ResourceType::Water => None,
        ResourceType::Wood => Some((300, 900)),
        ResourceType::Coal => Some((900, 1800)),
        ResourceType::Iron => Some((1800, 3600)),
    }
}

/// Per-biome resource placement profile. `table` is a weighted whitelist:
/// the types a biome is allowed to place, and their relative likelihood.
pub struct BiomeProfile {
    /// Probability an "other eligible tile" (non-forest, non-water) in this
    /// biome receives a resource at all.
    pub density: f64,
    /// Scales the drawn amount before flooring.
    pub amount_multiplier: f64,
    pub table: &'static [(ResourceType, f64)],
}

const FOREST_TABLE: &[(ResourceType, f64)] = &[
    (ResourceType::Wood, 0.7),
    (ResourceType::Coal, 0.2),
    (ResourceType::Iron, 0.1),
];

const DENSE_FOREST_TABLE: &[(ResourceType, f64)] = &[
    (ResourceType::Wood, 0.6),
    (ResourceType::Coal, 0.25),
    (ResourceType::Iron, 0.15),
];

const JUNGLE_TABLE: &[(ResourceType, f64)] = &[
    (ResourceType::Wood, 0.8),
    (ResourceType::Coal, 0.15),
    (ResourceType::Iron, 0.05),
];

const GRASSLAND_TABLE: &[(ResourceType, f64)] = &[(ResourceType::Wood, 1.0)];

const SAVANNA_TABLE: &[(ResourceType, f64)] =
    &[(ResourceType::Wood, 0.6), (ResourceType::Coal, 0.4)];

const DESERT_TABLE: &[(ResourceType, f64)] =
    &[(ResourceType::Coal, 0.5), (ResourceType::Iron, 0.5)];

const TUNDRA_TABLE: &[(ResourceType, f64)] =
    &[(ResourceType::Coal, 0.4), (ResourceType::Iron, 0.6)];

const SNOW_TABLE: &[(ResourceType, f64)] =
    &[(ResourceType::Iron, 0.7), (ResourceType::Coal, 0.3)];

const MOUNTAIN_TABLE: &[(ResourceType, f64)] =
    &[(ResourceType::Coal, 0.5), (ResourceType::Iron, 0.5)];

const MOUNTAIN_SNOW_TABLE: &[(ResourceType, f64)] =
    &[(ResourceType::Iron, 0.6), (ResourceType::Coal, 0.4)];

const SWAMP_TABLE: &[(ResourceType, f64)] =
    &[(ResourceType::Wood, 0.7), (ResourceType::Coal, 0.3)];

const MARSH_TABLE: &[(ResourceType, f64)] = &[(ResourceType::Wood, 1.0)];

/// `None` means the biome never places a random "other eligible tile"
/// resource (forest biomes are handled separately because they are never
/// density-gated; water biomes place deterministically in the generator).
#[must_use]
pub fn biome_profile(biome: Biome) -> Option<BiomeProfile> {
    match biome {
        Biome::Forest => Some(BiomeProfile {
            density: 1.0,
            amount_multiplier: 1.0,
            table: FOREST_TABLE,
        }),
        Biome::DenseForest => Some(BiomeProfile {
            density: 1.0,
            amount_multiplier: 1.2,
            table: DENSE_FOREST_TABLE,
        }),
        Biome::Jungle => Some(BiomeProfile {
            density: 1.0,
            amount_multiplier: 1.1,
            table: JUNGLE_TABLE,
        }),
        Biome::Grassland => Some(BiomeProfile {
            density: 0.08,
            amount_multiplier: 0.8,
            table: GRASSLAND_TABLE,
        }),
        Biome::Savanna => Some(BiomeProfile {
            density: 0.06,
            amount_multiplier: 0.8,
            table: SAVANNA_TABLE,
        }),
        Biome::Desert => Some(BiomeProfile {
            density: 0.04,
            amount_multiplier: 0.6,
            table: DESERT_TABLE,
        }),
        Biome::Tundra => Some(BiomeProfile {
            density: 0.07,
            amount_multiplier: 0.9,
            table: TUNDRA_TABLE,
        }),
        Biome::Snow => Some(BiomeProfile {
            density: 0.05,
            amount_multiplier: 0.9,
            table: SNOW_TABLE,
        }),
        Biome::Mountain => Some(BiomeProfile {
            density: 0.15,
            amount_multiplier: 1.3,
            table: MOUNTAIN_TABLE,
        }),
        Biome::MountainSnow => Some(BiomeProfile {
            density: 0.18,
            amount_multiplier: 1.4,
            table: MOUNTAIN_SNOW_TABLE,
        }),
        Biome::Swamp => Some(BiomeProfile {
            density: 0.1,
            amount_multiplier: 0.9,
            table: SWAMP_TABLE,
        }),
        Biome::Marsh => Some(BiomeProfile {
            density: 0.1,
            amount_multiplier: 0.85,
            table: MARSH_TABLE,
        }),
        Biome::OceanDeep
        | Biome::OceanShallow
        | Biome::Beach
        | Biome::Cliff
        | Biome::River
        | Biome::Lake => None,
    }
}

/// `true` for the forest-family biomes that always place a resource on any
/// eligible cell, bypassing the density roll entirely.
#[must_use]
pub fn is_forest_biome(biome: Biome) -> bool {
    matches!(biome, Biome::Forest | Biome::DenseForest | Biome::Jungle)
}

/// Whether `kind` is in `biome`'s whitelist, per the placement tables above.
#[must_use]
pub fn biome_allows(biome: Biome, kind: ResourceType) -> bool {
    if matches!(biome, Biome::River | Biome::Lake) {
        return kind == ResourceType::Water;
    }

    biome_profile(biome)
        .map(|profile| profile.table.iter().any(|(t, _)| *t == kind))
        .unwrap_or(false)
}
