//! Read-only item, location and shop descriptors.
//!
//! The catalog is assembled through [`CatalogBuilder`] and frozen by
//! `build()`. The compiler only reads it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// How an item is rendered when picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Charm,
    Big,
    Spell,
    Geo,
    Lifeblood,
    Soul,
    Lore,
    Flame,
}

/// What granting an item does to the player's save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GiveAction {
    #[default]
    None,
    Bool,
    Int,
    Charm,
    EquippedCharm,
    Additive,
    AddGeo,
    SpawnGeo,
    AddSoul,
    Lore,
    Map,
    Stag,
    Grub,
    Essence,
    MaskShard,
    VesselFragment,
    WanderersJournal,
    Kingsoul,
    Dreamer,
    Lifeblood,
}

impl GiveAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GiveAction::None => "None",
            GiveAction::Bool => "Bool",
            GiveAction::Int => "Int",
            GiveAction::Charm => "Charm",
            GiveAction::EquippedCharm => "EquippedCharm",
            GiveAction::Additive => "Additive",
            GiveAction::AddGeo => "AddGeo",
            GiveAction::SpawnGeo => "SpawnGeo",
            GiveAction::AddSoul => "AddSoul",
            GiveAction::Lore => "Lore",
            GiveAction::Map => "Map",
            GiveAction::Stag => "Stag",
            GiveAction::Grub => "Grub",
            GiveAction::Essence => "Essence",
            GiveAction::MaskShard => "MaskShard",
            GiveAction::VesselFragment => "VesselFragment",
            GiveAction::WanderersJournal => "WanderersJournal",
            GiveAction::Kingsoul => "Kingsoul",
            GiveAction::Dreamer => "Dreamer",
            GiveAction::Lifeblood => "Lifeblood",
        }
    }

    /// Actions granted without a shiny to spawn from cannot spawn geo.
    pub fn without_spawn(self) -> Self {
        match self {
            GiveAction::SpawnGeo => GiveAction::AddGeo,
            other => other,
        }
    }
}

/// What a location charges before handing over its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CostType {
    #[default]
    Geo,
    Essence,
    Simple,
    Grub,
    Wraiths,
    Dreamnail,
    WhisperingRoot,
    Spore,
    RancidEggs,
}

/// Layout of a lore text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextType {
    #[default]
    Lore,
    LeftLore,
    MajorLore,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Original shape of a location: where it is and what object/FSM hold it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationDef {
    pub name: String,
    pub scene: String,
    pub object: String,
    pub fsm: String,
    /// A second representation of the same pickup that must mirror content.
    pub alt_object: Option<String>,
    pub x: f32,
    pub y: f32,
    pub elevation: f32,
    /// Replace the existing object rather than adding a new one.
    pub replace: bool,
    /// Spawn a fresh shiny at `(x, y)`.
    pub new_shiny: bool,
    pub cost: i32,
    pub cost_type: CostType,
    pub pool: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub inspect_name: Option<String>,
    pub inspect_fsm: Option<String>,
    pub self_destruct_fsm: Option<String>,
    /// Player-data bool that reveals an enemy-drop shiny.
    pub pd_bool: Option<String>,
    pub bool_data_scene: Option<String>,
    pub bool_data_id: Option<String>,
    /// Persistent bool on the original shiny, if any.
    pub bool_name: Option<String>,
    pub enemy: Option<String>,
    pub in_chest: bool,
    pub chest_name: Option<String>,
    pub chest_fsm: Option<String>,
}

/// What an item looks like and does when granted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemDef {
    pub name: String,
    pub pool: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub action: GiveAction,
    pub name_key: String,
    pub shop_desc_key: String,
    pub shop_sprite_key: String,
    pub notch_cost: Option<String>,
    /// Vanilla object of the item's home location, used to pick container subtypes.
    pub object: Option<String>,
    pub geo: i32,
    pub lifeblood: i32,
    pub lore_sheet: Option<String>,
    pub lore_key: Option<String>,
    pub text_type: TextType,
    pub big_sprite_key: String,
    pub take_key: String,
    pub button_key: String,
    pub desc_one_key: String,
    pub desc_two_key: String,
}

/// A shop: the object holding the stock list and its purchase rules.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopDef {
    pub name: String,
    pub scene: String,
    pub object: String,
    pub required_bool: String,
    pub dung_discount: bool,
}

/// Items granted progressively under one shared popup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdditiveGroup {
    pub name: String,
    pub items: Vec<String>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    locations: Vec<LocationDef>,
    location_index: HashMap<String, usize>,
    items: Vec<ItemDef>,
    item_index: HashMap<String, usize>,
    shops: Vec<ShopDef>,
    shop_index: HashMap<String, usize>,
    additive_groups: Vec<AdditiveGroup>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_location(&mut self, def: LocationDef) -> Result<(), CatalogError> {
        register(&mut self.locations, &mut self.location_index, def.name.clone(), def)
    }

    pub fn register_item(&mut self, def: ItemDef) -> Result<(), CatalogError> {
        register(&mut self.items, &mut self.item_index, def.name.clone(), def)
    }

    pub fn register_shop(&mut self, def: ShopDef) -> Result<(), CatalogError> {
        register(&mut self.shops, &mut self.shop_index, def.name.clone(), def)
    }

    pub fn register_additive_group(&mut self, group: AdditiveGroup) -> Result<(), CatalogError> {
        if self.additive_groups.iter().any(|g| g.name == group.name) {
            return Err(CatalogError::DuplicateName(group.name));
        }
        self.additive_groups.push(group);
        Ok(())
    }

    /// Edit a registered location in place.
    pub fn mutate_location<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut LocationDef),
    {
        let index = self
            .location_index
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        f(&mut self.locations[*index]);
        Ok(())
    }

    /// Edit a registered item in place.
    pub fn mutate_item<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut ItemDef),
    {
        let index = self
            .item_index
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        f(&mut self.items[*index]);
        Ok(())
    }

    /// Finalize. Every additive group member must be a registered item.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        for group in &self.additive_groups {
            for item in &group.items {
                if !self.item_index.contains_key(item) {
                    return Err(CatalogError::UnresolvedRef {
                        group: group.name.clone(),
                        item: item.clone(),
                    });
                }
            }
        }

        Ok(Catalog {
            locations: self.locations,
            location_index: self.location_index,
            items: self.items,
            item_index: self.item_index,
            shops: self.shops,
            shop_index: self.shop_index,
            additive_groups: self.additive_groups,
        })
    }
}

fn register<T>(
    defs: &mut Vec<T>,
    index: &mut HashMap<String, usize>,
    name: String,
    def: T,
) -> Result<(), CatalogError> {
    if index.contains_key(&name) {
        return Err(CatalogError::DuplicateName(name));
    }
    index.insert(name, defs.len());
    defs.push(def);
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable descriptor lookup. Frozen after `build()`.
#[derive(Debug, Default)]
pub struct Catalog {
    locations: Vec<LocationDef>,
    location_index: HashMap<String, usize>,
    items: Vec<ItemDef>,
    item_index: HashMap<String, usize>,
    shops: Vec<ShopDef>,
    shop_index: HashMap<String, usize>,
    additive_groups: Vec<AdditiveGroup>,
}

impl Catalog {
    pub fn location(&self, name: &str) -> Option<&LocationDef> {
        self.location_index.get(name).map(|i| &self.locations[*i])
    }

    pub fn item(&self, name: &str) -> Option<&ItemDef> {
        self.item_index.get(name).map(|i| &self.items[*i])
    }

    pub fn shop(&self, name: &str) -> Option<&ShopDef> {
        self.shop_index.get(name).map(|i| &self.shops[*i])
    }

    pub fn is_shop(&self, name: &str) -> bool {
        self.shop_index.contains_key(name)
    }

    /// The additive group `item` belongs to, if any.
    pub fn additive_group(&self, item: &str) -> Option<&AdditiveGroup> {
        self.additive_groups
            .iter()
            .find(|g| g.items.iter().any(|i| i == item))
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn shop_count(&self) -> usize {
        self.shops.len()
    }

    pub fn locations(&self) -> impl Iterator<Item = &LocationDef> {
        self.locations.iter()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("additive group {group} references unknown item {item}")]
    UnresolvedRef { group: String, item: String },
}

// ===========================================================================
// Tests
// ===========================================================================
