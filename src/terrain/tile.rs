use serde::{Deserialize, Serialize};

/// One classified grid cell. Immutable once emitted, except for
/// `resource.remaining`, which mining mutates in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i64,
    pub y: i64,
    pub h: f64,
    #[serde(rename = "nH")]
    pub n_h: f64,
    pub w: bool,
    #[serde(rename = "wT", skip_serializing_if = "Option::is_none")]
    pub w_t: Option<WaterType>,
    pub t: f64,
    pub p: f64,
    pub stp: f64,
    pub b: Biome,
    pub c: ColorIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
    #[serde(rename = "vT", skip_serializing_if = "Option::is_none")]
    pub v_t: Option<VegetationType>,
    #[serde(rename = "sT", skip_serializing_if = "Option::is_none")]
    pub s_t: Option<SoilType>,
    #[serde(rename = "iC")]
    pub i_c: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<ResourceNode>,
}

impl Tile {
    #[must_use]
    pub fn is_land(&self) -> bool { !self.w }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterType {
    Ocean,
    River,
    Lake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Biome {
    OceanDeep,
    OceanShallow,
    Beach,
    Grassland,
    Forest,
    DenseForest,
    Jungle,
    Savanna,
    Desert,
    Tundra,
    Snow,
    Mountain,
    MountainSnow,
    Cliff,
    River,
    Lake,
    Swamp,
    Marsh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorIndex {
    OceanDeep,
    OceanShallow,
    Beach,
    Grassland,
    Forest,
    DenseForest,
    Jungle,
    Savanna,
    Desert,
    Tundra,
    Snow,
    Mountain,
    MountainSnow,
    Cliff,
    River,
    Lake,
    Swamp,
    Marsh,
}

impl From<Biome> for ColorIndex {
    fn from(biome: Biome) -> Self {
        match biome {
            Biome::OceanDeep => Self::OceanDeep,
            Biome::OceanShallow => Self::OceanShallow,
            Biome::Beach => Self::Beach,
            Biome::Grassland => Self::Grassland,
            Biome::Forest => Self::Forest,
            Biome::DenseForest => Self::DenseForest,
            Biome::Jungle => Self::Jungle,
            Biome::Savanna => Self::Savanna,
            Biome::Desert => Self::Desert,
            Biome::Tundra => Self::Tundra,
            Biome::Snow => Self::Snow,
            Biome::Mountain => Self::Mountain,
            Biome::MountainSnow => Self::MountainSnow,
            Biome::Cliff => Self::Cliff,
            Biome::River => Self::River,
            Biome::Lake => Self::Lake,
            Biome::Swamp => Self::Swamp,
            Biome::Marsh => Self::Marsh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VegetationType {
    None,
    Shrub,
    Coniferous,
    Deciduous,
    Tropical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoilType {
    Rock,
    Sand,
    Loam,
    Clay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Water,
    Wood,
    Coal,
    Iron,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub amount: u32,
    pub remaining: u32,
    pub hardness: f64,
    pub x: i64,
    pub y: i64,
    #[serde(rename = "respawnTime", skip_serializing_if = "Option::is_none")]
    pub respawn_time: Option<u32>,
}

impl ResourceNode {
    #[must_use]
    pub fn is_depleted(&self) -> bool { self.remaining == 0 }
}

impl ResourceType {
    /// Lower-case wire name, as sent in `miningSuccess.resource`.
    #[must_use]
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Wood => "wood",
            Self::Coal => "coal",
            Self::Iron => "iron",
        }
    }
}
