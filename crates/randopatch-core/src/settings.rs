//! Per-session inputs to the compiler: feature flags, precomputed cost tables
//! and the placement list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An item assigned to a location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub item: String,
    pub location: String,
}

impl Placement {
    pub fn new(item: &str, location: &str) -> Self {
        Self {
            item: item.to_string(),
            location: location.to_string(),
        }
    }

    /// The item sits at its own vanilla location.
    pub fn is_vanilla(&self) -> bool {
        self.item == self.location
    }
}

/// Named boolean toggles, one per item pool plus behavior switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    /// Route NPC rewards through their own dialogue instead of shinies.
    pub npc_item_dialogue: bool,
    pub randomize_dreamers: bool,
    pub randomize_skills: bool,
    pub randomize_claw_pieces: bool,
    pub randomize_cloak_pieces: bool,
    pub randomize_charms: bool,
    pub randomize_keys: bool,
    pub randomize_mask_shards: bool,
    pub randomize_vessel_fragments: bool,
    pub randomize_pale_ore: bool,
    pub randomize_charm_notches: bool,
    pub randomize_geo_chests: bool,
    pub randomize_rancid_eggs: bool,
    pub egg_shop: bool,
    pub randomize_relics: bool,
    pub randomize_maps: bool,
    pub randomize_stags: bool,
    pub randomize_grubs: bool,
    pub randomize_mimics: bool,
    pub randomize_whispering_roots: bool,
    pub randomize_rocks: bool,
    pub randomize_soul_totems: bool,
    pub randomize_palace_totems: bool,
    pub randomize_lore_tablets: bool,
    pub randomize_palace_tablets: bool,
    pub randomize_journal_entries: bool,
    pub randomize_palace_entries: bool,
    pub randomize_lifeblood_cocoons: bool,
    pub randomize_grimmkin_flames: bool,
    pub randomize_boss_essence: bool,
    pub randomize_boss_geo: bool,
    pub randomize_focus: bool,
    pub randomize_swim: bool,
}

impl Flags {
    /// Whether items of `pool` are shuffled this session. Unknown pools are not.
    pub fn randomizes_pool(&self, pool: &str) -> bool {
        match pool {
            "Dreamer" => self.randomize_dreamers,
            "Skill" => self.randomize_skills,
            "SplitClaw" => self.randomize_claw_pieces,
            "SplitCloak" | "SplitCloakLocation" => self.randomize_cloak_pieces,
            "Charm" => self.randomize_charms,
            "Key" => self.randomize_keys,
            "Mask" => self.randomize_mask_shards,
            "Vessel" => self.randomize_vessel_fragments,
            "Ore" => self.randomize_pale_ore,
            "Notch" => self.randomize_charm_notches,
            "Geo" => self.randomize_geo_chests,
            "Egg" => self.randomize_rancid_eggs,
            "EggShopItem" | "EggShopLocation" => self.egg_shop,
            "Relic" => self.randomize_relics,
            "Map" => self.randomize_maps,
            "Stag" => self.randomize_stags,
            "Grub" => self.randomize_grubs,
            "Root" => self.randomize_whispering_roots,
            "Rock" => self.randomize_rocks,
            "Soul" => self.randomize_soul_totems,
            "PalaceSoul" => self.randomize_palace_totems,
            "PalaceLore" => self.randomize_palace_tablets,
            "Lore" => self.randomize_lore_tablets,
            "Journal" => self.randomize_journal_entries,
            "PalaceJournal" => self.randomize_palace_entries,
            "Lifeblood" => self.randomize_lifeblood_cocoons,
            "Flame" => self.randomize_grimmkin_flames,
            "Essence_Boss" => self.randomize_boss_essence,
            "Boss_Geo" => self.randomize_boss_geo,
            "Focus" => self.randomize_focus,
            "Swim" => self.randomize_swim,
            _ => false,
        }
    }
}

/// Everything besides placements and the catalog that a compile reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub flags: Flags,
    /// Shop price per item, computed when the placements were generated.
    pub shop_costs: BTreeMap<String, i32>,
    /// Per-location costs for essence, grub and egg-shop gates.
    pub variable_costs: BTreeMap<String, i32>,
    /// Grub location -> `true` for a mimic, `false` for a grub.
    pub mimic_placements: BTreeMap<String, bool>,
}

impl SessionSettings {
    pub fn with_flags(flags: Flags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    pub fn shop_cost(&self, item: &str) -> Option<i32> {
        self.shop_costs.get(item).copied()
    }

    pub fn variable_cost(&self, location: &str) -> Option<i32> {
        self.variable_costs.get(location).copied()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
