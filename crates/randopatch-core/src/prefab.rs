//! Prefab kinds and the factory seam the host implements to instantiate them.

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;
use crate::patch::PatchError;
use crate::scene::Scene;

pub const GRUB_JAR_ELEVATION: f32 = 0.1;
pub const MIMIC_BOTTLE_ELEVATION: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeoRockSubtype {
    #[default]
    Default,
    Abyss,
    City,
    Deepnest,
    Fung01,
    Fung02,
    Grave01,
    Grave02,
    GreenPath01,
    GreenPath02,
    Hive,
    Mine,
    Outskirts,
    Outskirts420,
}

impl GeoRockSubtype {
    /// Pick the rock that matches a vanilla rock object's name.
    pub fn from_object_name(name: &str) -> Self {
        const BY_NAME: &[(&str, GeoRockSubtype)] = &[
            ("Giant Geo Egg", GeoRockSubtype::Outskirts420),
            ("Abyss", GeoRockSubtype::Abyss),
            ("City", GeoRockSubtype::City),
            ("Deepnest", GeoRockSubtype::Deepnest),
            ("Fung 01", GeoRockSubtype::Fung01),
            ("Fung 02", GeoRockSubtype::Fung02),
            ("Grave 01", GeoRockSubtype::Grave01),
            ("Grave 02", GeoRockSubtype::Grave02),
            ("Green Path 01", GeoRockSubtype::GreenPath01),
            ("Green Path 02", GeoRockSubtype::GreenPath02),
            ("Hive", GeoRockSubtype::Hive),
            ("Mine", GeoRockSubtype::Mine),
            ("Outskirts", GeoRockSubtype::Outskirts),
        ];
        BY_NAME
            .iter()
            .find(|(key, _)| name.contains(key))
            .map(|(_, subtype)| *subtype)
            .unwrap_or_default()
    }

    /// Height of the rock's pivot above the ground.
    pub fn elevation(self) -> f32 {
        match self {
            GeoRockSubtype::Abyss => 0.4,
            GeoRockSubtype::City | GeoRockSubtype::Deepnest => 0.5,
            GeoRockSubtype::Fung01 | GeoRockSubtype::Fung02 => 0.45,
            GeoRockSubtype::Grave01 | GeoRockSubtype::Grave02 => 0.4,
            GeoRockSubtype::GreenPath01 | GeoRockSubtype::GreenPath02 => 0.5,
            GeoRockSubtype::Hive => 0.35,
            GeoRockSubtype::Mine => 0.45,
            GeoRockSubtype::Outskirts => 0.6,
            GeoRockSubtype::Outskirts420 => 1.2,
            GeoRockSubtype::Default => 0.68,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SoulTotemSubtype {
    #[default]
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    Palace,
    PathOfPain,
}

impl SoulTotemSubtype {
    /// Exact object name, except the Path of Pain totems which carry a suffix.
    pub fn from_object_name(name: &str) -> Self {
        match name {
            "Soul Totem 5" => SoulTotemSubtype::A,
            "Soul Totem mini_two_horned" => SoulTotemSubtype::B,
            "Soul Totem mini_horned" => SoulTotemSubtype::C,
            "Soul Totem 1" => SoulTotemSubtype::D,
            "Soul Totem 4" => SoulTotemSubtype::E,
            "Soul Totem 2" => SoulTotemSubtype::F,
            "Soul Totem 3" => SoulTotemSubtype::G,
            "Soul Totem white" => SoulTotemSubtype::Palace,
            _ if name.starts_with("Soul Totem white_Infinte") => SoulTotemSubtype::PathOfPain,
            _ => SoulTotemSubtype::A,
        }
    }

    pub fn elevation(self) -> f32 {
        match self {
            SoulTotemSubtype::A | SoulTotemSubtype::F => 0.5,
            SoulTotemSubtype::B | SoulTotemSubtype::C => -0.1,
            SoulTotemSubtype::D | SoulTotemSubtype::E | SoulTotemSubtype::G => 0.3,
            SoulTotemSubtype::Palace | SoulTotemSubtype::PathOfPain => 1.3,
        }
    }
}

/// A container that can stand in for a location's original object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "container", rename_all = "snake_case")]
pub enum Container {
    GrubJar,
    MimicBottle,
    GeoRock { subtype: GeoRockSubtype, geo: i32 },
    SoulTotem { subtype: SoulTotemSubtype },
}

impl Container {
    pub fn prefab(self) -> Prefab {
        match self {
            Container::GrubJar => Prefab::GrubJar,
            Container::MimicBottle => Prefab::MimicBottle,
            Container::GeoRock { subtype, .. } => Prefab::GeoRock(subtype),
            Container::SoulTotem { subtype } => Prefab::SoulTotem(subtype),
        }
    }

    pub fn elevation(self) -> f32 {
        match self {
            Container::GrubJar => GRUB_JAR_ELEVATION,
            Container::MimicBottle => MIMIC_BOTTLE_ELEVATION,
            Container::GeoRock { subtype, .. } => subtype.elevation(),
            Container::SoulTotem { subtype } => subtype.elevation(),
        }
    }
}

/// Templates the host knows how to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Prefab {
    Shiny,
    GrubJar,
    MimicBottle,
    GeoRock(GeoRockSubtype),
    SoulTotem(SoulTotemSubtype),
}

/// Creates ready-made prefab objects inside a scene.
///
/// The returned object is a fresh root carrying the prefab's FSMs in their
/// vanilla layout; callers rename, move and reparent it.
pub trait PrefabFactory {
    fn instantiate(&self, scene: &mut Scene, prefab: Prefab) -> Result<ObjectId, PatchError>;
}

// ===========================================================================
// Tests
// ===========================================================================
