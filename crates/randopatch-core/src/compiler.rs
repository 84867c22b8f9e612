//! Placement compiler: turns a placement list into an ordered [`PatchRegistry`].
//!
//! Each non-shop placement runs through a first-match-wins cascade. Early
//! stages may swap the location's object for a freshly created shiny; that
//! change lives in a per-placement [`Shape`] read by the later stages, so the
//! catalog itself is never touched. Shop placements are folded into one stock
//! edit per shop object. Generated names are numbered by counters local to a
//! single `compile` call.

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CostType, ItemDef, ItemType, LocationDef, ShopDef};
use crate::content::{BigItemDef, PlacedContent, ShinyContent, ShopEntry, shiny};
use crate::death_edit::DeathEdit;
use crate::fsm_edit::{FsmEdit, NpcKind};
use crate::object_edit::ObjectEdit;
use crate::patch::{PatchAction, PatchKind, PatchRegistry};
use crate::prefab::{Container, GeoRockSubtype, SoulTotemSubtype};
use crate::settings::{Placement, SessionSettings};
use crate::step::ActivationCondition;

// ---------------------------------------------------------------------------
// Fixed identifiers
// ---------------------------------------------------------------------------

/// Pools whose vanilla placements stay untouched unless the pool is shuffled.
const VANILLA_SKIP_POOLS: &[&str] = &["Map", "Stag", "Rock", "Soul", "PalaceSoul", "PalaceLore", "Lore"];

const VENGEFUL_SPIRIT: &str = "Vengeful_Spirit";
const BASIN_VESSEL: &str = "Vessel_Fragment-Basin";
const HUNTERS_JOURNAL: &str = "Hunter's_Journal";
const DREAM_NAIL: &str = "Dream_Nail";
const EGG_SHOP_PREFIX: &str = "450_Geo-Egg_Shop";
const GRUZ_MOTHER: &str = "Boss_Geo-Gruz_Mother";
const LURKER_KEY: &str = "Simple_Key-Lurker";
const JUNK_PIT_CHEST: &str = "JunkPitChest";
const ESSENCE_BOSS: &str = "Essence_Boss";

/// Scene edits elsewhere look these shinies up by their old fixed names.
const LEGACY_SHINY_LOCATIONS: &[&str] = &[
    DREAM_NAIL,
    "Mask_Shard-Brooding_Mawlek",
    "Nailmaster's_Glory",
    "Godtuner",
];
const LEGACY_SHINY: &str = "Randomizer Shiny";
const LEGACY_NEW_SHINY: &str = "New Shiny";

const TUTORIAL_TABLET_LOCATIONS: &[&str] = &["Focus", "World_Sense"];
const TUTORIAL_TABLET: &str = "Tut_tablet_top";
const INSPECTION_FSM: &str = "Inspection";

const VENGEFUL_SPIRIT_OBJECT: &str = "Vengeful Spirit";
const SHAMAN_REVEAL: (&str, &str, &str) = ("Shaman Meeting", "Conversation Control", "Spell Appear");
const BASIN_REVEAL: (&str, &str, &str) = ("Fountain", "Conversation Control", "Vessel Appear");
const HUNTER: (&str, &str) = ("Hunter NPC", "Conversation Control");
const EGG_SAC_OBJECT: &str = "Egg Sac";
const BLUGGSAC_PREFIX: &str = "Corpse Egg Sac";
const BLUGGSAC_FSM: &str = "Control";

const DREAM_NAIL_SCENE: &str = "RestingGrounds_04";
/// `(object, fsm, state)` of every bool test gating the Dream Nail cutscene.
const DREAM_NAIL_CHECKS: &[(&str, &str, &str)] = &[
    ("Binding Shield Activate", "FSM", "Check"),
    ("Dreamer Plaque Inspect", "Conversation Control", "End"),
    ("Dreamer Scene 2", "Control", "Init"),
    ("PreDreamnail", "FSM", "Check"),
];

const LORE_SHOP_SCENES: &[&str] = &["Room_shop", "Room_mapper", "Room_Charm_Shop", "Fungus2_26"];
const SHOP_LIST_OBJECT: &str = "UI List";
const SHOP_CONFIRM_FSM: &str = "Confirm Control";

const DEFAULT_LORE_SHEET: &str = "Lore Tablets";
const DUNG_DISCOUNT_MIN_COST: i32 = 5;
const DEFAULT_COST: i32 = 1;

const GRUB_ITEM: &str = "Grub";
const MIMIC_ITEM: &str = "Mimic_Grub";

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Compile `placements` into a fresh registry.
///
/// Pure over its inputs: compiling the same placements and settings twice
/// yields equal registries. Unknown catalog identifiers are skipped with a
/// warning rather than failing the whole compile.
pub fn compile(
    placements: &[Placement],
    settings: &SessionSettings,
    catalog: &Catalog,
) -> PatchRegistry {
    let mut compiler = Compiler::new(settings, catalog);

    let (shop, regular): (Vec<&Placement>, Vec<&Placement>) = placements
        .iter()
        .partition(|p| catalog.is_shop(&p.location));
    for placement in regular {
        compiler.placement(placement);
    }
    compiler.shops(&shop);
    compiler.lore_in_shops();
    compiler.unrandomized_mimics();

    let registry = PatchRegistry::new(compiler.actions);
    info!(
        placements = placements.len(),
        patches = registry.len(),
        object = registry.count(PatchKind::Object),
        fsm = registry.count(PatchKind::Fsm),
        death = registry.count(PatchKind::Death),
        "compiled patch registry"
    );
    registry
}

// ---------------------------------------------------------------------------
// Working shape
// ---------------------------------------------------------------------------

/// Where a placement's content ends up. Starts as the catalog shape and is
/// redirected when an earlier stage creates a shiny in its place.
#[derive(Debug, Clone, PartialEq)]
struct Shape {
    object: String,
    fsm: String,
    item_type: ItemType,
}

impl Shape {
    fn of(def: &LocationDef) -> Self {
        Self {
            object: def.object.clone(),
            fsm: def.fsm.clone(),
            item_type: def.item_type,
        }
    }

    fn redirect(&mut self, shiny_name: String) {
        self.object = shiny_name;
        self.fsm = shiny::FSM.to_string();
        self.item_type = ItemType::Charm;
    }
}

enum Flow {
    Continue,
    Stop,
}

fn numbered(counter: &mut u32, prefix: &str) -> String {
    let name = format!("{prefix} {counter}");
    *counter += 1;
    name
}

fn scene_data_condition(def: &LocationDef) -> ActivationCondition {
    ActivationCondition::SceneData {
        scene: def.bool_data_scene.clone().unwrap_or_else(|| def.scene.clone()),
        id: def.bool_data_id.clone().unwrap_or_default(),
    }
}

/// Container the item itself looks like, if it has one.
fn container_for(item: &ItemDef) -> Option<Container> {
    let object = item.object.as_deref().unwrap_or_default();
    if item.pool.starts_with("Grub") {
        Some(Container::GrubJar)
    } else if item.pool.starts_with("Mimic") {
        Some(Container::MimicBottle)
    } else if item.pool == "Rock" {
        let subtype = GeoRockSubtype::from_object_name(object);
        // The giant egg drops five-geo pieces.
        let geo = if subtype == GeoRockSubtype::Outskirts420 {
            item.geo / 5
        } else {
            item.geo
        };
        Some(Container::GeoRock { subtype, geo })
    } else if item.item_type == ItemType::Soul {
        Some(Container::SoulTotem {
            subtype: SoulTotemSubtype::from_object_name(object),
        })
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

struct Compiler<'a> {
    settings: &'a SessionSettings,
    catalog: &'a Catalog,
    actions: Vec<PatchAction>,
    shinies: u32,
    grubs: u32,
    rocks: u32,
    totems: u32,
}

impl<'a> Compiler<'a> {
    fn new(settings: &'a SessionSettings, catalog: &'a Catalog) -> Self {
        Self {
            settings,
            catalog,
            actions: Vec::new(),
            shinies: 0,
            grubs: 0,
            rocks: 0,
            totems: 0,
        }
    }

    fn push(&mut self, action: PatchAction) {
        self.actions.push(action);
    }

    fn npc_dialogue(&self) -> bool {
        self.settings.flags.npc_item_dialogue
    }

    fn variable_cost(&self, location: &str) -> i32 {
        self.settings.variable_cost(location).unwrap_or_else(|| {
            warn!(location, "no variable cost recorded, defaulting to {DEFAULT_COST}");
            DEFAULT_COST
        })
    }

    // -- Per placement ------------------------------------------------------

    fn placement(&mut self, placement: &Placement) {
        let catalog = self.catalog;
        let location = placement.location.as_str();
        let (Some(old), Some(new)) = (catalog.location(location), catalog.item(&placement.item))
        else {
            warn!(
                item = %placement.item,
                location,
                "placement names an unknown catalog entry, skipped"
            );
            return;
        };

        if placement.is_vanilla()
            && VANILLA_SKIP_POOLS.contains(&new.pool.as_str())
            && !self.settings.flags.randomizes_pool(&new.pool)
        {
            debug!(location, pool = %new.pool, "vanilla placement left untouched");
            return;
        }

        let before = self.actions.len();
        if !self.npc_reward(old, new, location) {
            self.classify(old, new, location);
        }
        if location == DREAM_NAIL {
            self.dream_nail_checks(location);
        }
        debug!(
            item = %new.name,
            location,
            patches = self.actions.len() - before,
            "placement compiled"
        );
    }

    fn npc_reward(&mut self, old: &LocationDef, new: &ItemDef, location: &str) -> bool {
        if !self.npc_dialogue() {
            return false;
        }
        let Some(npc) = NpcKind::from_object(&old.object) else {
            return false;
        };
        self.push(PatchAction::fsm(
            &old.scene,
            &old.object,
            &old.fsm,
            FsmEdit::ChangeNpcReward {
                npc,
                action: new.action,
                item: new.name.clone(),
                location: location.to_string(),
            },
        ));
        true
    }

    fn classify(&mut self, old: &LocationDef, new: &ItemDef, location: &str) {
        let npc_dialogue = self.npc_dialogue();

        if let Some(inspect) = &old.inspect_name {
            let fsm = old.inspect_fsm.as_deref().unwrap_or(INSPECTION_FSM);
            self.push(PatchAction::fsm(&old.scene, inspect, fsm, FsmEdit::DisableLoreTablet));
        } else if TUTORIAL_TABLET_LOCATIONS.contains(&location)
            && !self.settings.flags.randomize_lore_tablets
        {
            self.push(PatchAction::fsm(
                &old.scene,
                TUTORIAL_TABLET,
                INSPECTION_FSM,
                FsmEdit::DisableLoreTablet,
            ));
        }

        if let Some(destruct_fsm) = &old.self_destruct_fsm
            && old.replace
            && !(npc_dialogue && location == VENGEFUL_SPIRIT)
        {
            self.push(PatchAction::fsm(
                &old.scene,
                &old.object,
                destruct_fsm,
                FsmEdit::PreventSelfDestruct,
            ));
        }

        let has_cost = (old.cost != 0 || old.cost_type != CostType::Geo)
            && !(npc_dialogue && location == BASIN_VESSEL)
            && old.cost_type != CostType::RancidEggs;
        let can_replace = old.elevation != 0.0
            && !(npc_dialogue && location == VENGEFUL_SPIRIT)
            && location != HUNTERS_JOURNAL
            && !has_cost;

        if can_replace && let Some(container) = container_for(new) {
            self.place_container(old, new, location, container);
            return;
        }

        let mut shape = Shape::of(old);
        if let Flow::Stop = self.redirect(old, new, location, &mut shape) {
            return;
        }
        self.content(old, new, location, &shape);
        if has_cost {
            self.cost_prompt(old, new, location, &shape);
        }
    }

    fn place_container(&mut self, old: &LocationDef, new: &ItemDef, location: &str, container: Container) {
        let name = match container {
            Container::GrubJar => numbered(&mut self.grubs, "Randomizer Grub Jar"),
            Container::MimicBottle => numbered(&mut self.grubs, "Randomizer Mimic Bottle"),
            Container::GeoRock { .. } => numbered(&mut self.rocks, "Randomizer Geo Rock"),
            Container::SoulTotem { .. } => numbered(&mut self.totems, "Randomizer Soul Totem"),
        };
        let edit = if old.new_shiny {
            ObjectEdit::CreateContainer {
                container,
                name,
                x: old.x,
                y: old.y + container.elevation() - old.elevation,
                item: new.name.clone(),
                location: location.to_string(),
                unrandomized: false,
            }
        } else {
            ObjectEdit::ReplaceWithContainer {
                container,
                object: old.object.clone(),
                elevation: old.elevation,
                name,
                item: new.name.clone(),
                location: location.to_string(),
                unrandomized: false,
            }
        };
        self.push(PatchAction::object(&old.scene, edit));
        if !old.new_shiny {
            self.prevent_shiny_self_destruct(old);
        }
    }

    /// Shinies that set a player-data bool destroy themselves through it.
    fn prevent_shiny_self_destruct(&mut self, old: &LocationDef) {
        if !old.replace && old.fsm == shiny::FSM && old.bool_name.is_some() {
            self.push(PatchAction::fsm(
                &old.scene,
                &old.object,
                shiny::FSM,
                FsmEdit::PreventSelfDestruct,
            ));
        }
    }

    /// Special locations and the generic shiny fallback.
    fn redirect(&mut self, old: &LocationDef, new: &ItemDef, location: &str, shape: &mut Shape) -> Flow {
        let scene = old.scene.as_str();
        let npc_dialogue = self.npc_dialogue();

        if location.starts_with(EGG_SHOP_PREFIX) {
            let shiny_name = format!("{LEGACY_SHINY} {location}");
            let cost = self.variable_cost(location);
            self.push(PatchAction::object(
                scene,
                ObjectEdit::CreateInactiveShiny {
                    parent: old.object.clone(),
                    shiny_name: shiny_name.clone(),
                    x: old.x,
                    y: old.y,
                    activation: ActivationCondition::EggsSold(cost),
                    content: None,
                },
            ));
            shape.redirect(shiny_name);
        } else if location == GRUZ_MOTHER {
            let shiny_name = numbered(&mut self.shinies, LEGACY_SHINY);
            let parent = format!("{shiny_name} Parent");
            let content = PlacedContent {
                item: new.name.clone(),
                location: location.to_string(),
                content: self.shiny_content(new),
            };
            self.push(PatchAction::object(
                scene,
                ObjectEdit::CreateInactiveShiny {
                    parent: parent.clone(),
                    shiny_name,
                    x: old.x,
                    y: old.y,
                    activation: scene_data_condition(old),
                    content: Some(content),
                },
            ));
            self.push(PatchAction::death(
                scene,
                DeathEdit::BossGeoReward {
                    enemy: old.enemy.clone().unwrap_or_else(|| old.object.clone()),
                    parent,
                },
            ));
            return Flow::Stop;
        } else if let Some(pd_bool) = &old.pd_bool {
            let shiny_name = self.enemy_shiny(old, ActivationCondition::PlayerDataBool(pd_bool.clone()));
            shape.redirect(shiny_name);
        } else if old.bool_data_id.is_some() {
            let shiny_name = self.enemy_shiny(old, scene_data_condition(old));
            shape.redirect(shiny_name);
        } else if old.replace {
            let numbered_name = numbered(&mut self.shinies, LEGACY_SHINY);
            let shiny_name = if LEGACY_SHINY_LOCATIONS.contains(&location) {
                LEGACY_SHINY.to_string()
            } else {
                numbered_name
            };

            if npc_dialogue && location == VENGEFUL_SPIRIT {
                self.replace_and_reveal(scene, VENGEFUL_SPIRIT_OBJECT, &shiny_name, SHAMAN_REVEAL);
            } else if location == BASIN_VESSEL {
                if npc_dialogue {
                    self.replace_and_reveal(scene, &old.object, &shiny_name, BASIN_REVEAL);
                } else {
                    self.push(PatchAction::object(
                        scene,
                        ObjectEdit::CreateNewShiny {
                            name: shiny_name.clone(),
                            x: old.x,
                            y: old.y,
                        },
                    ));
                }
            } else if npc_dialogue && old.object == EGG_SAC_OBJECT {
                self.push(PatchAction::object(
                    scene,
                    ObjectEdit::CreateInactiveShiny {
                        parent: format!("{shiny_name} Parent"),
                        shiny_name: shiny_name.clone(),
                        x: old.x,
                        y: old.y,
                        activation: ActivationCondition::SceneData {
                            scene: scene.to_string(),
                            id: old.object.clone(),
                        },
                        content: None,
                    },
                ));
                self.push(PatchAction::fsm_prefix(
                    scene,
                    BLUGGSAC_PREFIX,
                    BLUGGSAC_FSM,
                    FsmEdit::ReplaceBluggsacReward {
                        shiny_name: shiny_name.clone(),
                    },
                ));
            } else {
                if location == HUNTERS_JOURNAL {
                    self.push(PatchAction::fsm(
                        scene,
                        HUNTER.0,
                        HUNTER.1,
                        FsmEdit::ReplaceJournalWithShiny {
                            shiny_name: shiny_name.clone(),
                        },
                    ));
                }
                self.push(PatchAction::object(
                    scene,
                    ObjectEdit::ReplaceObjectWithShiny {
                        object: old.object.clone(),
                        shiny_name: shiny_name.clone(),
                    },
                ));
            }
            shape.redirect(shiny_name);
        } else if old.new_shiny {
            let numbered_name = numbered(&mut self.shinies, LEGACY_NEW_SHINY);
            let name = if location == LURKER_KEY {
                LEGACY_NEW_SHINY.to_string()
            } else {
                numbered_name
            };
            self.push(PatchAction::object(
                scene,
                ObjectEdit::CreateNewShiny {
                    name: name.clone(),
                    x: old.x,
                    y: old.y,
                },
            ));
            shape.redirect(name);
        } else if (shape.item_type == ItemType::Geo || old.pool == JUNK_PIT_CHEST)
            && new.item_type != ItemType::Geo
        {
            let shiny_name = numbered(&mut self.shinies, "Randomizer Chest Shiny");
            self.push(PatchAction::object(
                scene,
                ObjectEdit::AddShinyToChest {
                    chest: old.object.clone(),
                    chest_fsm: old.fsm.clone(),
                    shiny_name: shiny_name.clone(),
                },
            ));
            shape.redirect(shiny_name);
        } else if old.item_type == ItemType::Flame {
            // Emitted even for flame items so upgrading Grimmchild cannot lock
            // the location out.
            self.push(PatchAction::fsm(
                scene,
                &old.object,
                &old.fsm,
                FsmEdit::ChangeGrimmkinReward {
                    action: new.action,
                    item: new.name.clone(),
                    location: location.to_string(),
                },
            ));
            return Flow::Stop;
        } else if old.pool == ESSENCE_BOSS {
            self.push(PatchAction::fsm(
                scene,
                &old.object,
                &old.fsm,
                FsmEdit::ChangeBossEssenceReward {
                    action: new.action,
                    item: new.name.clone(),
                    location: location.to_string(),
                },
            ));
            return Flow::Stop;
        }
        Flow::Continue
    }

    /// An inactive shiny revealed by an enemy's death. Returns its name.
    fn enemy_shiny(&mut self, old: &LocationDef, activation: ActivationCondition) -> String {
        let shiny_name = numbered(&mut self.shinies, LEGACY_SHINY);
        let parent = format!("{shiny_name} Parent");
        self.push(PatchAction::object(
            &old.scene,
            ObjectEdit::CreateInactiveShiny {
                parent: parent.clone(),
                shiny_name: shiny_name.clone(),
                x: old.x,
                y: old.y,
                activation,
                content: None,
            },
        ));
        match &old.enemy {
            Some(enemy) => self.push(PatchAction::death(
                &old.scene,
                DeathEdit::ActivateEnemyShiny {
                    enemy: enemy.clone(),
                    parent,
                },
            )),
            None => warn!(location = %old.name, "enemy drop without an enemy name"),
        }
        shiny_name
    }

    fn replace_and_reveal(
        &mut self,
        scene: &str,
        object: &str,
        shiny_name: &str,
        (reveal_object, reveal_fsm, reveal_state): (&str, &str, &str),
    ) {
        self.push(PatchAction::object(
            scene,
            ObjectEdit::ReplaceObjectWithShiny {
                object: object.to_string(),
                shiny_name: shiny_name.to_string(),
            },
        ));
        self.push(PatchAction::fsm(
            scene,
            reveal_object,
            reveal_fsm,
            FsmEdit::ActivateShinyFromState {
                state: reveal_state.to_string(),
                shiny_name: shiny_name.to_string(),
            },
        ));
    }

    // -- Content ------------------------------------------------------------

    fn shiny_content(&self, new: &ItemDef) -> ShinyContent {
        match new.item_type {
            ItemType::Big | ItemType::Spell => ShinyContent::BigItem {
                action: new.action,
                defs: self.big_item_defs(new),
            },
            ItemType::Geo => ShinyContent::Geo { amount: new.geo },
            ItemType::Lifeblood => ShinyContent::Lifeblood {
                count: new.lifeblood,
            },
            ItemType::Soul => ShinyContent::Soul,
            ItemType::Lore => ShinyContent::Text {
                action: new.action,
                key: new.lore_key.clone().unwrap_or_default(),
                sheet: new
                    .lore_sheet
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LORE_SHEET.to_string()),
                text_type: new.text_type,
            },
            ItemType::Charm | ItemType::Flame => ShinyContent::Item {
                action: new.action,
                name_key: new.name_key.clone(),
                sprite_key: new.shop_sprite_key.clone(),
            },
        }
    }

    /// One popup page per member of the item's additive group.
    fn big_item_defs(&self, new: &ItemDef) -> Vec<BigItemDef> {
        match self.catalog.additive_group(&new.name) {
            Some(group) => group
                .items
                .iter()
                .filter_map(|name| self.catalog.item(name))
                .map(|member| BigItemDef {
                    item: new.name.clone(),
                    ..BigItemDef::from_item(member)
                })
                .collect(),
            None => vec![BigItemDef::from_item(new)],
        }
    }

    fn content(&mut self, old: &LocationDef, new: &ItemDef, location: &str, shape: &Shape) {
        let scene = old.scene.as_str();
        if new.item_type == ItemType::Geo {
            let chest = if old.in_chest {
                Some((
                    old.chest_name.as_deref().unwrap_or(&shape.object),
                    old.chest_fsm.as_deref().unwrap_or(&shape.fsm),
                ))
            } else if shape.item_type == ItemType::Geo || old.pool == JUNK_PIT_CHEST {
                Some((shape.object.as_str(), shape.fsm.as_str()))
            } else {
                None
            };
            if let Some((object, fsm)) = chest {
                self.push(PatchAction::fsm(
                    scene,
                    object,
                    fsm,
                    FsmEdit::ChangeChestGeo {
                        item: new.name.clone(),
                        location: location.to_string(),
                        geo: new.geo,
                    },
                ));
                return;
            }
        }

        let edit = FsmEdit::ChangeShinyContent {
            item: new.name.clone(),
            location: location.to_string(),
            content: self.shiny_content(new),
        };
        // Some locations keep a second copy of the pickup that must match.
        if let Some(alt) = &old.alt_object {
            self.push(PatchAction::fsm(scene, &shape.object, &shape.fsm, edit.clone()));
            self.push(PatchAction::fsm(scene, alt, &shape.fsm, edit));
        } else {
            self.push(PatchAction::fsm(scene, &shape.object, &shape.fsm, edit));
        }
    }

    fn cost_prompt(&mut self, old: &LocationDef, new: &ItemDef, location: &str, shape: &Shape) {
        let cost = match old.cost_type {
            CostType::Essence | CostType::Grub => self.variable_cost(location),
            _ => old.cost,
        };
        self.push(PatchAction::fsm(
            &old.scene,
            &shape.object,
            &shape.fsm,
            FsmEdit::AddYesNoDialogue {
                name_key: new.name_key.clone(),
                cost,
                cost_type: old.cost_type,
            },
        ));
    }

    fn dream_nail_checks(&mut self, location: &str) {
        for (object, fsm, state) in DREAM_NAIL_CHECKS {
            self.push(PatchAction::fsm(
                DREAM_NAIL_SCENE,
                object,
                fsm,
                FsmEdit::ChangeBoolTest {
                    state: state.to_string(),
                    location: location.to_string(),
                },
            ));
        }
    }

    // -- Shops and trailing passes -----------------------------------------

    fn shop_entry(&self, shop: &ShopDef, item: &ItemDef) -> ShopEntry {
        let action = item.action.without_spawn();
        let cost = match self.settings.shop_cost(&item.name) {
            Some(cost) if cost != 0 => cost,
            _ => {
                warn!(
                    item = %item.name,
                    shop = %shop.name,
                    "no saved shop cost, defaulting to {DEFAULT_COST}"
                );
                DEFAULT_COST
            }
        };
        ShopEntry {
            bool_name: format!("RandomizerMod.{}.{}.{}", action.as_str(), item.name, shop.name),
            name_key: item.name_key.clone(),
            desc_key: item.shop_desc_key.clone(),
            sprite_key: item.shop_sprite_key.clone(),
            cost,
            required_bool: shop.required_bool.clone(),
            dung_discount: shop.dung_discount && cost >= DUNG_DISCOUNT_MIN_COST,
            notch_cost_bool: item.notch_cost.clone(),
            currency: item.item_type == ItemType::Geo,
        }
    }

    /// One stock edit per distinct shop object, entries in placement order.
    fn shops(&mut self, placements: &[&Placement]) {
        let catalog = self.catalog;
        let mut stocks: Vec<(&str, &str, Vec<ShopEntry>)> = Vec::new();
        for placement in placements {
            let (Some(shop), Some(item)) = (
                catalog.shop(&placement.location),
                catalog.item(&placement.item),
            ) else {
                warn!(
                    item = %placement.item,
                    shop = %placement.location,
                    "shop placement names an unknown catalog entry, skipped"
                );
                continue;
            };
            let entry = self.shop_entry(shop, item);
            match stocks
                .iter_mut()
                .find(|(scene, object, _)| *scene == shop.scene && *object == shop.object)
            {
                Some((_, _, entries)) => entries.push(entry),
                None => stocks.push((&shop.scene, &shop.object, vec![entry])),
            }
        }
        for (scene, object, entries) in stocks {
            self.push(PatchAction::object(
                scene,
                ObjectEdit::ChangeShopContents {
                    object: object.to_string(),
                    entries,
                },
            ));
        }
    }

    fn lore_in_shops(&mut self) {
        let flags = &self.settings.flags;
        if !(flags.randomize_lore_tablets || flags.randomize_palace_tablets) {
            return;
        }
        for scene in LORE_SHOP_SCENES {
            self.push(PatchAction::fsm(
                scene,
                SHOP_LIST_OBJECT,
                SHOP_CONFIRM_FSM,
                FsmEdit::ShowLoreTextInShop,
            ));
        }
    }

    /// With mimics shuffled among unshuffled grubs, each grub location still
    /// decides between jar and mimic from the settings table.
    fn unrandomized_mimics(&mut self) {
        let flags = &self.settings.flags;
        if !(flags.randomize_mimics && !flags.randomize_grubs) {
            return;
        }
        let (settings, catalog) = (self.settings, self.catalog);
        for (location, &mimic) in &settings.mimic_placements {
            let Some(def) = catalog.location(location) else {
                warn!(location = %location, "mimic placement names an unknown location, skipped");
                continue;
            };
            let (container, name, item) = if mimic {
                (Container::MimicBottle, format!("Randomizer Mimic {location}"), MIMIC_ITEM)
            } else {
                (Container::GrubJar, format!("Randomizer Grub {location}"), GRUB_ITEM)
            };
            let edit = if def.replace {
                ObjectEdit::ReplaceWithContainer {
                    container,
                    object: def.object.clone(),
                    elevation: def.elevation,
                    name,
                    item: item.to_string(),
                    location: location.clone(),
                    unrandomized: true,
                }
            } else {
                ObjectEdit::CreateContainer {
                    container,
                    name,
                    x: def.x,
                    y: def.y + container.elevation() - def.elevation,
                    item: item.to_string(),
                    location: location.clone(),
                    unrandomized: true,
                }
            };
            self.push(PatchAction::object(&def.scene, edit));
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GiveAction;
    use crate::patch::{FsmPatch, ObjectPatch};
    use crate::settings::Flags;
    use crate::test_utils::sample_catalog;

    fn compile_one(item: &str, location: &str, settings: &SessionSettings) -> PatchRegistry {
        compile(&[Placement::new(item, location)], settings, &sample_catalog())
    }

    fn object_edits(registry: &PatchRegistry) -> Vec<&ObjectEdit> {
        registry.object_patches().map(|p: &ObjectPatch| &p.edit).collect()
    }

    fn fsm_patches(registry: &PatchRegistry) -> Vec<&FsmPatch> {
        registry.fsm_patches().collect()
    }

    #[test]
    fn gruz_mother_is_inactive_shiny_then_boss_reward() {
        let registry = compile_one("Mask_Shard", GRUZ_MOTHER, &SessionSettings::default());
        assert_eq!(
            registry.edit_names(),
            vec!["CreateInactiveShiny", "BossGeoReward"]
        );
        let kinds: Vec<PatchKind> = registry.iter().map(PatchAction::kind).collect();
        assert_eq!(kinds, vec![PatchKind::Object, PatchKind::Death]);

        let ObjectEdit::CreateInactiveShiny {
            parent,
            activation,
            content,
            ..
        } = object_edits(&registry)[0]
        else {
            panic!("expected inactive shiny");
        };
        assert_eq!(parent, "Randomizer Shiny 0 Parent");
        assert_eq!(
            activation,
            &ActivationCondition::SceneData {
                scene: "Crossroads_04".into(),
                id: "Battle Scene".into(),
            }
        );
        assert_eq!(
            content.as_ref().map(|c| &c.content),
            Some(&ShinyContent::Item {
                action: GiveAction::MaskShard,
                name_key: "NAME_MASK_SHARD".into(),
                sprite_key: "ShopIcons.Mask_Shard".into(),
            })
        );
    }

    #[test]
    fn three_items_in_one_shop_share_one_edit() {
        let mut settings = SessionSettings::default();
        for (item, cost) in [("Wayward_Compass", 220), ("Gathering_Swarm", 300), ("Stalwart_Shell", 200)] {
            settings.shop_costs.insert(item.into(), cost);
        }
        let placements = [
            Placement::new("Wayward_Compass", "Sly"),
            Placement::new("Gathering_Swarm", "Sly"),
            Placement::new("Stalwart_Shell", "Sly"),
        ];
        let registry = compile(&placements, &settings, &sample_catalog());
        assert_eq!(registry.len(), 1);
        let ObjectEdit::ChangeShopContents { object, entries } = object_edits(&registry)[0] else {
            panic!("expected shop contents");
        };
        assert_eq!(object, "Shop Menu");
        let names: Vec<&str> = entries.iter().map(|e| e.bool_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "RandomizerMod.Charm.Wayward_Compass.Sly",
                "RandomizerMod.Charm.Gathering_Swarm.Sly",
                "RandomizerMod.Charm.Stalwart_Shell.Sly",
            ]
        );
        assert!(entries.iter().all(|e| e.dung_discount));
        assert_eq!(entries[0].notch_cost_bool.as_deref(), Some("charmCost_2"));
    }

    #[test]
    fn missing_or_cheap_shop_cost_drops_discount() {
        let mut settings = SessionSettings::default();
        settings.shop_costs.insert("Gathering_Swarm".into(), 4);
        let placements = [
            Placement::new("Wayward_Compass", "Sly"),
            Placement::new("Gathering_Swarm", "Sly"),
        ];
        let registry = compile(&placements, &settings, &sample_catalog());
        let ObjectEdit::ChangeShopContents { entries, .. } = object_edits(&registry)[0] else {
            panic!("expected shop contents");
        };
        assert_eq!((entries[0].cost, entries[0].dung_discount), (1, false));
        assert_eq!((entries[1].cost, entries[1].dung_discount), (4, false));
    }

    #[test]
    fn different_shops_get_separate_edits() {
        let placements = [
            Placement::new("Wayward_Compass", "Sly"),
            Placement::new("Gathering_Swarm", "Salubra"),
        ];
        let registry = compile(&placements, &SessionSettings::default(), &sample_catalog());
        let scenes: Vec<&str> = registry.iter().map(PatchAction::scene).collect();
        assert_eq!(scenes, vec!["Room_shop", "Room_Charm_Shop"]);
    }

    #[test]
    fn npc_dialogue_short_circuits_cascade() {
        let settings = SessionSettings::with_flags(Flags {
            npc_item_dialogue: true,
            randomize_maps: true,
            ..Default::default()
        });
        let registry = compile_one("Great_Slash", "Crossroads_Map", &settings);
        assert_eq!(registry.edit_names(), vec!["ChangeNpcReward"]);
        let patch = fsm_patches(&registry)[0];
        assert!(patch.matches("Crossroads_33", "Cornifer", "Conversation Control"));
        assert!(matches!(
            patch.edit,
            FsmEdit::ChangeNpcReward {
                npc: NpcKind::Cornifer,
                ..
            }
        ));
    }

    #[test]
    fn npc_location_without_dialogue_flag_gets_shiny_content() {
        let registry = compile_one("Great_Slash", "Great_Slash", &SessionSettings::default());
        assert_eq!(registry.edit_names(), vec!["ChangeShinyContent"]);
    }

    #[test]
    fn vanilla_map_is_skipped_unless_maps_are_shuffled() {
        let registry = compile_one("Crossroads_Map", "Crossroads_Map", &SessionSettings::default());
        assert!(registry.is_empty());

        let settings = SessionSettings::with_flags(Flags {
            randomize_maps: true,
            ..Default::default()
        });
        let registry = compile_one("Crossroads_Map", "Crossroads_Map", &settings);
        assert!(!registry.is_empty());
    }

    #[test]
    fn unknown_entries_are_skipped() {
        let registry = compile(
            &[
                Placement::new("Nope", "Mothwing_Cloak"),
                Placement::new("Mask_Shard", "Nowhere"),
            ],
            &SessionSettings::default(),
            &sample_catalog(),
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn grub_replaces_elevated_shiny() {
        let registry = compile_one("Grub", "Mask_Shard-Seer", &SessionSettings::default());
        assert_eq!(
            registry.edit_names(),
            vec!["PreventSelfDestruct", "ReplaceWithContainer"]
        );
        let ObjectEdit::ReplaceWithContainer {
            container,
            name,
            elevation,
            ..
        } = object_edits(&registry)[0]
        else {
            panic!("expected container replacement");
        };
        assert_eq!(*container, Container::GrubJar);
        assert_eq!(name, "Randomizer Grub Jar 0");
        assert_eq!(*elevation, 0.3);
    }

    #[test]
    fn giant_egg_rock_divides_geo() {
        let registry = compile_one(
            "Geo_Rock-Outskirts420",
            "Grub-Crossroads_Spikes",
            &SessionSettings::default(),
        );
        let ObjectEdit::ReplaceWithContainer { container, .. } = object_edits(&registry)[0] else {
            panic!("expected container replacement");
        };
        assert_eq!(
            *container,
            Container::GeoRock {
                subtype: GeoRockSubtype::Outskirts420,
                geo: 84,
            }
        );
    }

    #[test]
    fn soul_totem_takes_subtype_from_item_object() {
        let registry = compile_one(
            "Soul_Totem-Cliffs_Main",
            "Grub-Crossroads_Acid",
            &SessionSettings::default(),
        );
        let ObjectEdit::ReplaceWithContainer { container, name, .. } = object_edits(&registry)[0]
        else {
            panic!("expected container replacement");
        };
        assert_eq!(
            *container,
            Container::SoulTotem {
                subtype: SoulTotemSubtype::G,
            }
        );
        assert_eq!(name, "Randomizer Soul Totem 0");
    }

    #[test]
    fn dream_nail_adds_four_bool_checks() {
        let registry = compile_one(DREAM_NAIL, DREAM_NAIL, &SessionSettings::default());
        assert_eq!(
            registry.edit_names(),
            vec![
                "ReplaceObjectWithShiny",
                "ChangeShinyContent",
                "ChangeBoolTest",
                "ChangeBoolTest",
                "ChangeBoolTest",
                "ChangeBoolTest",
            ]
        );
        let ObjectEdit::ReplaceObjectWithShiny { shiny_name, .. } = object_edits(&registry)[0] else {
            panic!("expected shiny replacement");
        };
        assert_eq!(shiny_name, LEGACY_SHINY);
        assert!(fsm_patches(&registry)
            .iter()
            .skip(1)
            .all(|p| p.scene == DREAM_NAIL_SCENE));
    }

    /// A catalog where the Dream Nail pickup can host a container.
    fn elevated_dream_nail() -> Catalog {
        let mut b = crate::catalog::CatalogBuilder::new();
        b.register_location(LocationDef {
            name: DREAM_NAIL.into(),
            scene: DREAM_NAIL_SCENE.into(),
            object: "Dream Nail Get".into(),
            fsm: shiny::FSM.into(),
            elevation: 0.5,
            replace: true,
            pool: "Skill".into(),
            ..Default::default()
        })
        .unwrap();
        b.register_item(ItemDef {
            name: "Grub".into(),
            pool: "Grub".into(),
            action: GiveAction::Grub,
            ..Default::default()
        })
        .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn dream_nail_checks_follow_container_too() {
        let registry = compile(
            &[Placement::new("Grub", DREAM_NAIL)],
            &SessionSettings::default(),
            &elevated_dream_nail(),
        );
        let names = registry.edit_names();
        assert_eq!(names[0], "ReplaceWithContainer");
        assert_eq!(names.iter().filter(|n| **n == "ChangeBoolTest").count(), 4);
    }

    #[test]
    fn hunters_journal_hooks_the_hunter_before_replacing() {
        let registry = compile_one("Grub", HUNTERS_JOURNAL, &SessionSettings::default());
        assert_eq!(
            registry.edit_names(),
            vec!["ReplaceJournalWithShiny", "ReplaceObjectWithShiny", "ChangeShinyContent"]
        );
        let hook = fsm_patches(&registry)[0];
        assert!(hook.matches("Fungus1_08", HUNTER.0, HUNTER.1));
        assert_eq!(
            hook.edit,
            FsmEdit::ReplaceJournalWithShiny {
                shiny_name: "Randomizer Shiny 0".into(),
            }
        );
        assert!(fsm_patches(&registry)[1].matches("Fungus1_08", "Randomizer Shiny 0", shiny::FSM));
    }

    #[test]
    fn cost_prompt_uses_variable_cost() {
        let mut settings = SessionSettings::default();
        settings.variable_costs.insert("Dream_Wielder".into(), 500);
        let registry = compile_one("Dream_Wielder", "Dream_Wielder", &settings);
        assert_eq!(
            registry.edit_names(),
            vec!["CreateNewShiny", "ChangeShinyContent", "AddYesNoDialogue"]
        );
        let prompt = fsm_patches(&registry)[1];
        assert!(prompt.matches("RestingGrounds_07", "New Shiny 0", shiny::FSM));
        assert_eq!(
            prompt.edit,
            FsmEdit::AddYesNoDialogue {
                name_key: "NAME_DREAM_WIELDER".into(),
                cost: 500,
                cost_type: CostType::Essence,
            }
        );
    }

    #[test]
    fn big_item_in_chest_gets_additive_pages() {
        let registry = compile_one("Mothwing_Cloak", "Geo_Chest-Greenpath", &SessionSettings::default());
        assert_eq!(
            registry.edit_names(),
            vec!["AddShinyToChest", "ChangeShinyContent"]
        );
        let patch = fsm_patches(&registry)[0];
        assert!(patch.matches("Fungus1_13", "Randomizer Chest Shiny 0", shiny::FSM));
        let FsmEdit::ChangeShinyContent {
            content: ShinyContent::BigItem { defs, .. },
            ..
        } = &patch.edit
        else {
            panic!("expected big item content");
        };
        let sprites: Vec<&str> = defs.iter().map(|d| d.sprite_key.as_str()).collect();
        assert_eq!(sprites, vec!["Prompts.Dash", "Prompts.ShadowDash"]);
        assert!(defs.iter().all(|d| d.item == "Mothwing_Cloak"));
    }

    #[test]
    fn geo_in_chest_swaps_chest_geo() {
        let registry = compile_one(
            "Geo_Chest-Mask_Maker",
            "Geo_Chest-Greenpath",
            &SessionSettings::default(),
        );
        assert_eq!(registry.edit_names(), vec!["ChangeChestGeo"]);
        assert!(fsm_patches(&registry)[0].matches("Fungus1_13", "Chest", "Chest Control"));
    }

    #[test]
    fn flame_location_stops_after_grimmkin_reward() {
        let registry = compile_one(
            "Wayward_Compass",
            "Grimmkin_Flame-City_Storerooms",
            &SessionSettings::default(),
        );
        assert_eq!(registry.edit_names(), vec!["ChangeGrimmkinReward"]);
    }

    #[test]
    fn lore_location_disables_inspect_object() {
        let registry = compile_one(
            "Mask_Shard",
            "Lore_Tablet-Kings_Pass_Focus",
            &SessionSettings::default(),
        );
        assert_eq!(
            registry.edit_names(),
            vec!["DisableLoreTablet", "ReplaceObjectWithShiny", "ChangeShinyContent"]
        );
        assert!(fsm_patches(&registry)[0].matches("Tutorial_01", TUTORIAL_TABLET, INSPECTION_FSM));
    }

    #[test]
    fn lore_text_item_defaults_sheet() {
        let registry = compile_one(
            "Lore_Tablet-Kings_Pass_Focus",
            "Mothwing_Cloak",
            &SessionSettings::default(),
        );
        let FsmEdit::ChangeShinyContent { content, .. } = &fsm_patches(&registry)[0].edit else {
            panic!("expected shiny content");
        };
        assert!(matches!(
            content,
            ShinyContent::Text { sheet, key, .. } if sheet == DEFAULT_LORE_SHEET && key == "TUT_TAB_01"
        ));
    }

    #[test]
    fn lore_shuffle_adds_shop_lore_patches() {
        let settings = SessionSettings::with_flags(Flags {
            randomize_lore_tablets: true,
            ..Default::default()
        });
        let registry = compile(&[], &settings, &sample_catalog());
        assert_eq!(registry.edit_names(), vec!["ShowLoreTextInShop"; 4]);
        let scenes: Vec<&str> = registry.iter().map(PatchAction::scene).collect();
        assert_eq!(scenes, LORE_SHOP_SCENES);
    }

    #[test]
    fn decoupled_mimics_place_jars_and_bottles() {
        let mut settings = SessionSettings::with_flags(Flags {
            randomize_mimics: true,
            ..Default::default()
        });
        settings.mimic_placements.insert("Grub-Crossroads_Acid".into(), true);
        settings.mimic_placements.insert("Grub-Crossroads_Spikes".into(), false);
        let registry = compile(&[], &settings, &sample_catalog());
        let edits = object_edits(&registry);
        assert_eq!(edits.len(), 2);
        assert!(matches!(
            edits[0],
            ObjectEdit::ReplaceWithContainer {
                container: Container::MimicBottle,
                unrandomized: true,
                ..
            }
        ));
        let ObjectEdit::ReplaceWithContainer { name, .. } = edits[0] else {
            unreachable!();
        };
        assert_eq!(name, "Randomizer Mimic Grub-Crossroads_Acid");
        let ObjectEdit::CreateContainer {
            container, name, y, ..
        } = edits[1]
        else {
            panic!("expected new container");
        };
        assert_eq!(*container, Container::GrubJar);
        assert_eq!(name, "Randomizer Grub Grub-Crossroads_Spikes");
        assert!((*y - 4.0).abs() < 1e-5);
    }

    #[test]
    fn mimics_follow_grubs_when_both_shuffled() {
        let mut settings = SessionSettings::with_flags(Flags {
            randomize_mimics: true,
            randomize_grubs: true,
            ..Default::default()
        });
        settings.mimic_placements.insert("Grub-Crossroads_Acid".into(), true);
        assert!(compile(&[], &settings, &sample_catalog()).is_empty());
    }

    #[test]
    fn counters_restart_each_compile() {
        let catalog = sample_catalog();
        let placements = [
            Placement::new("Mask_Shard", "Mothwing_Cloak"),
            Placement::new("Grub", "Mask_Shard-Seer"),
        ];
        let first = compile(&placements, &SessionSettings::default(), &catalog);
        let second = compile(&placements, &SessionSettings::default(), &catalog);
        assert_eq!(first, second);
        let ObjectEdit::ReplaceObjectWithShiny { shiny_name, .. } = object_edits(&first)[0] else {
            panic!("expected shiny replacement");
        };
        assert_eq!(shiny_name, "Randomizer Shiny 0");
    }
}
