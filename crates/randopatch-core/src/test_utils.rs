//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the fixtures
//! are available in unit tests and, via the `test-utils` feature, in the
//! integration-test crate.

use crate::catalog::{
    AdditiveGroup, Catalog, CatalogBuilder, CostType, GiveAction, ItemDef, ItemType, LocationDef,
    ShopDef,
};
use crate::content::shiny;
use crate::fsm::Fsm;
use crate::id::ObjectId;
use crate::patch::PatchError;
use crate::prefab::{Prefab, PrefabFactory};
use crate::scene::{Scene, SceneObject};
use crate::step::{HostStep, kinds};

// ===========================================================================
// Steps
// ===========================================================================

pub fn host(kind: &str) -> HostStep {
    HostStep::new(kind)
}

fn wait() -> HostStep {
    host("Wait")
}

// ===========================================================================
// Vanilla FSM layouts
// ===========================================================================

/// `Shiny Control` as found on an unmodified pickup.
pub fn shiny_control_fsm() -> Fsm {
    let mut fsm = Fsm::new("Shiny Item", shiny::FSM);
    fsm.add_state(shiny::INIT)
        .unwrap()
        .add_step(host(kinds::PLAYER_DATA_BOOL_TEST).with_param("isTrue", "DESTROY"));
    fsm.add_state(shiny::IDLE).unwrap().add_step(wait());
    fsm.add_state(shiny::CHARM)
        .unwrap()
        .add_step(host(kinds::SET_PLAYER_DATA_BOOL).with_param("boolName", "hasDash"));
    fsm.add_state(shiny::TRINK_FLASH).unwrap().add_step(wait());
    fsm.add_state(shiny::BIG_GET_FLASH)
        .unwrap()
        .add_step(host("CreateUIMsgGetItem"));
    fsm.add_state(shiny::FINISH).unwrap();
    fsm.add_state("Destroy").unwrap().add_step(host(kinds::DESTROY_SELF));

    fsm.add_transition(shiny::INIT, shiny::FINISHED, shiny::IDLE).unwrap();
    fsm.add_transition(shiny::INIT, "DESTROY", "Destroy").unwrap();
    fsm.add_transition(shiny::IDLE, shiny::TAKE, shiny::CHARM).unwrap();
    fsm.add_transition(shiny::CHARM, shiny::FINISHED, shiny::TRINK_FLASH).unwrap();
    fsm.add_transition(shiny::TRINK_FLASH, shiny::FINISHED, shiny::FINISH).unwrap();
    fsm.add_transition(shiny::BIG_GET_FLASH, shiny::FINISHED, shiny::FINISH).unwrap();
    fsm
}

/// An FSM that destroys its owner once the vanilla reward is collected.
pub fn self_destruct_fsm(owner: &str, fsm_name: &str) -> Fsm {
    let mut fsm = Fsm::new(owner, fsm_name);
    fsm.add_state("Check Active")
        .unwrap()
        .add_step(host(kinds::DESTROY_SELF));
    fsm.add_state("Idle").unwrap();
    let destroy = fsm.add_state("Destroy").unwrap();
    destroy.add_step(wait());
    destroy.add_step(host(kinds::DESTROY_SELF));
    destroy.add_step(host(kinds::ACTIVATE_GAME_OBJECT));
    fsm.add_transition("Check Active", shiny::FINISHED, "Idle").unwrap();
    fsm.add_transition("Idle", "DESTROY", "Destroy").unwrap();
    fsm
}

/// Cornifer's conversation FSM. The map purchase state ends with five
/// reward steps, or one for the Deepnest variant.
pub fn cornifer_fsm(deepnest: bool) -> Fsm {
    let owner = if deepnest { "Cornifer Deepnest" } else { "Cornifer" };
    let mut fsm = Fsm::new(owner, "Conversation Control");
    fsm.add_state("Check Active")
        .unwrap()
        .add_step(host(kinds::PLAYER_DATA_BOOL_TEST).with_param("isTrue", "DESTROY"));
    let convo = fsm.add_state("Convo Choice").unwrap();
    convo.add_step(host("GetPlayerDataInt"));
    convo.add_step(host(kinds::PLAYER_DATA_BOOL_TEST).with_param("isTrue", "BOUGHT"));
    let get = fsm.add_state("Geo Pause and GetMap").unwrap();
    get.add_step(wait());
    get.add_step(host(kinds::SET_PLAYER_DATA_BOOL));
    if !deepnest {
        get.add_step(host(kinds::SET_PLAYER_DATA_BOOL));
        get.add_step(host(kinds::SEND_EVENT_BY_NAME));
        get.add_step(host("PlayAudioEvent"));
        get.add_step(host(kinds::INCREMENT_PLAYER_DATA_INT));
    }
    fsm.add_state("Box Up 3").unwrap();
    fsm.add_state("Box Down Event 2").unwrap();
    fsm.add_state("Not At Deepnest").unwrap();
    fsm.add_state("Destroy").unwrap().add_step(host(kinds::DESTROY_SELF));

    fsm.add_transition("Check Active", shiny::FINISHED, "Convo Choice").unwrap();
    fsm.add_transition("Check Active", "DESTROY", "Destroy").unwrap();
    fsm.add_transition("Convo Choice", "YES", "Geo Pause and GetMap").unwrap();
    fsm.add_transition("Geo Pause and GetMap", shiny::FINISHED, "Box Up 3").unwrap();
    fsm.add_transition("Not At Deepnest", shiny::FINISHED, "Destroy").unwrap();
    fsm
}

/// A dialogue FSM that checks in `check_state` and rewards in `give_state`.
pub fn npc_fsm(owner: &str, check_state: &str, give_state: &str) -> Fsm {
    let mut fsm = Fsm::new(owner, "Conversation Control");
    fsm.add_state(check_state)
        .unwrap()
        .add_step(host(kinds::PLAYER_DATA_BOOL_TEST));
    let give = fsm.add_state(give_state).unwrap();
    give.add_step(host(kinds::SET_PLAYER_DATA_BOOL));
    give.add_step(host(kinds::SEND_EVENT_BY_NAME));
    fsm.add_transition(check_state, "CONVO_FINISH", give_state).unwrap();
    fsm
}

pub fn chest_fsm() -> Fsm {
    let mut fsm = Fsm::new("Chest", "Chest Control");
    fsm.add_state("Init").unwrap();
    let spawn = fsm.add_state("Spawn Items").unwrap();
    spawn.add_step(host(kinds::FLING_OBJECTS));
    spawn.add_step(wait());
    fsm.add_transition("Init", "OPEN", "Spawn Items").unwrap();
    fsm
}

/// Flame and essence reward layout: check in `Init`, grant in `Get`.
pub fn reward_fsm(owner: &str, fsm_name: &str) -> Fsm {
    let mut fsm = Fsm::new(owner, fsm_name);
    fsm.add_state("Init")
        .unwrap()
        .add_step(host(kinds::PLAYER_DATA_BOOL_TEST));
    let get = fsm.add_state("Get").unwrap();
    get.add_step(host(kinds::INCREMENT_PLAYER_DATA_INT));
    get.add_step(host(kinds::SET_PLAYER_DATA_BOOL));
    fsm.add_transition("Init", shiny::FINISHED, "Get").unwrap();
    fsm
}

/// The shop list's purchase confirmation FSM.
pub fn shop_confirm_fsm() -> Fsm {
    let mut fsm = Fsm::new("UI List", "Confirm Control");
    fsm.add_state("Special Type?").unwrap().add_step(host("IntSwitch"));
    fsm.add_state("Deselect").unwrap();
    fsm.add_transition("Special Type?", shiny::FINISHED, "Deselect").unwrap();
    fsm
}

// ===========================================================================
// Prefabs
// ===========================================================================

/// Builds prefabs with the vanilla FSM layouts above.
pub struct TestFactory;

impl PrefabFactory for TestFactory {
    fn instantiate(&self, scene: &mut Scene, prefab: Prefab) -> Result<ObjectId, PatchError> {
        let object = match prefab {
            Prefab::Shiny => SceneObject::new("Shiny Item").with_fsm(shiny_control_fsm()),
            Prefab::GrubJar => SceneObject::new("Grub Bottle").with_fsm(bottle_fsm()),
            Prefab::MimicBottle => SceneObject::new("Mimic Bottle").with_fsm(bottle_fsm()),
            Prefab::GeoRock(subtype) => {
                let mut fsm = Fsm::new("", "Geo Rock");
                fsm.variables.get_or_create_int("Geo").value = 5;
                fsm.add_state("Initiate")
                    .unwrap()
                    .add_step(host(kinds::BOOL_TEST));
                let destroy = fsm.add_state("Destroy").unwrap();
                destroy.add_step(host(kinds::FLING_OBJECTS));
                destroy.add_step(host(kinds::DESTROY_SELF));
                SceneObject::new(&format!("Geo Rock {subtype:?}")).with_fsm(fsm)
            }
            Prefab::SoulTotem(_) => {
                let mut fsm = Fsm::new("", "soul_totem");
                fsm.add_state("Init").unwrap().add_step(host(kinds::BOOL_TEST));
                fsm.add_state("Hit").unwrap().add_step(host("FlingObjects"));
                SceneObject::new("Soul Totem").with_fsm(fsm)
            }
        };
        Ok(scene.add(object))
    }
}

/// A factory whose prefabs were never preloaded.
pub struct EmptyFactory;

impl PrefabFactory for EmptyFactory {
    fn instantiate(&self, _scene: &mut Scene, prefab: Prefab) -> Result<ObjectId, PatchError> {
        Err(PatchError::Prefab(format!("{prefab:?}")))
    }
}

fn bottle_fsm() -> Fsm {
    let mut fsm = Fsm::new("", "Bottle Control");
    fsm.add_state("Init").unwrap().add_step(host(kinds::BOOL_TEST));
    fsm.add_state("Shatter")
        .unwrap()
        .add_step(host(kinds::ACTIVATE_GAME_OBJECT));
    fsm.add_transition("Init", "HIT", "Shatter").unwrap();
    fsm
}

// ===========================================================================
// Catalog
// ===========================================================================

fn location(name: &str, scene: &str, object: &str, fsm: &str) -> LocationDef {
    LocationDef {
        name: name.into(),
        scene: scene.into(),
        object: object.into(),
        fsm: fsm.into(),
        ..Default::default()
    }
}

fn item(name: &str, pool: &str, item_type: ItemType, action: GiveAction) -> ItemDef {
    ItemDef {
        name: name.into(),
        pool: pool.into(),
        item_type,
        action,
        name_key: format!("NAME_{}", name.to_uppercase()),
        shop_desc_key: format!("DESC_{}", name.to_uppercase()),
        shop_sprite_key: format!("ShopIcons.{name}"),
        ..Default::default()
    }
}

/// A small catalog covering each placement category.
pub fn sample_catalog() -> Catalog {
    let mut b = CatalogBuilder::new();

    b.register_location(LocationDef {
        x: 29.5,
        y: 13.4,
        pool: "Boss_Geo".into(),
        item_type: ItemType::Geo,
        bool_data_scene: Some("Crossroads_04".into()),
        bool_data_id: Some("Battle Scene".into()),
        enemy: Some("Giant Fly".into()),
        ..location("Boss_Geo-Gruz_Mother", "Crossroads_04", "Giant Fly", "")
    })
    .unwrap();
    b.register_location(LocationDef {
        replace: true,
        pool: "Skill".into(),
        item_type: ItemType::Big,
        ..location("Mothwing_Cloak", "Fungus1_04_boss", "Shiny Item", shiny::FSM)
    })
    .unwrap();
    b.register_location(LocationDef {
        replace: true,
        pool: "Skill".into(),
        item_type: ItemType::Big,
        ..location("Dream_Nail", "RestingGrounds_04", "Dream Nail Get", shiny::FSM)
    })
    .unwrap();
    b.register_location(LocationDef {
        elevation: 0.3,
        replace: true,
        pool: "Mask".into(),
        bool_name: Some("heartPieceCollected".into()),
        self_destruct_fsm: Some("Shiny Control".into()),
        ..location("Mask_Shard-Seer", "RestingGrounds_07", "Heart Piece", shiny::FSM)
    })
    .unwrap();
    b.register_location(LocationDef {
        x: 70.0,
        y: 8.0,
        new_shiny: true,
        cost: 0,
        cost_type: CostType::Essence,
        pool: "Charm".into(),
        ..location("Dream_Wielder", "RestingGrounds_07", "Shiny Item", shiny::FSM)
    })
    .unwrap();
    b.register_location(LocationDef {
        pool: "Map".into(),
        ..location("Crossroads_Map", "Crossroads_33", "Cornifer", "Conversation Control")
    })
    .unwrap();
    b.register_location(LocationDef {
        pool: "Skill".into(),
        ..location("Great_Slash", "Room_nailmaster_02", "NM Sheo NPC", "Conversation Control")
    })
    .unwrap();
    b.register_location(LocationDef {
        elevation: 0.2,
        replace: true,
        pool: "Journal".into(),
        ..location("Hunter's_Journal", "Fungus1_08", "Hunter Journal", shiny::FSM)
    })
    .unwrap();
    b.register_location(LocationDef {
        elevation: 0.1,
        replace: true,
        pool: "Grub".into(),
        ..location("Grub-Crossroads_Acid", "Crossroads_35", "Grub Bottle", "Bottle Control")
    })
    .unwrap();
    b.register_location(LocationDef {
        x: 12.0,
        y: 4.0,
        elevation: 0.1,
        pool: "Grub".into(),
        ..location("Grub-Crossroads_Spikes", "Crossroads_31", "Grub Bottle", "Bottle Control")
    })
    .unwrap();
    b.register_location(LocationDef {
        pool: "Geo".into(),
        item_type: ItemType::Geo,
        ..location("Geo_Chest-Greenpath", "Fungus1_13", "Chest", "Chest Control")
    })
    .unwrap();
    b.register_location(LocationDef {
        pool: "Flame".into(),
        item_type: ItemType::Flame,
        ..location(
            "Grimmkin_Flame-City_Storerooms",
            "Ruins1_28",
            "Flamebearer Spawn",
            "Spawn Control",
        )
    })
    .unwrap();
    b.register_location(LocationDef {
        replace: true,
        pool: "Lore".into(),
        item_type: ItemType::Lore,
        inspect_name: Some("Tut_tablet_top".into()),
        inspect_fsm: Some("Inspection".into()),
        ..location("Lore_Tablet-Kings_Pass_Focus", "Tutorial_01", "Shiny Item", shiny::FSM)
    })
    .unwrap();

    b.register_item(ItemDef {
        big_sprite_key: "Prompts.Dash".into(),
        ..item("Mothwing_Cloak", "Skill", ItemType::Big, GiveAction::Additive)
    })
    .unwrap();
    b.register_item(ItemDef {
        big_sprite_key: "Prompts.ShadowDash".into(),
        ..item("Shade_Cloak", "Skill", ItemType::Big, GiveAction::Additive)
    })
    .unwrap();
    b.register_item(item("Dream_Nail", "Skill", ItemType::Big, GiveAction::Bool))
        .unwrap();
    b.register_item(item("Mask_Shard", "Mask", ItemType::Charm, GiveAction::MaskShard))
        .unwrap();
    b.register_item(ItemDef {
        notch_cost: Some("charmCost_2".into()),
        ..item("Wayward_Compass", "Charm", ItemType::Charm, GiveAction::Charm)
    })
    .unwrap();
    b.register_item(ItemDef {
        notch_cost: Some("charmCost_1".into()),
        ..item("Gathering_Swarm", "Charm", ItemType::Charm, GiveAction::Charm)
    })
    .unwrap();
    b.register_item(ItemDef {
        notch_cost: Some("charmCost_4".into()),
        ..item("Stalwart_Shell", "Charm", ItemType::Charm, GiveAction::Charm)
    })
    .unwrap();
    b.register_item(item("Dream_Wielder", "Charm", ItemType::Charm, GiveAction::Charm))
        .unwrap();
    b.register_item(item("Crossroads_Map", "Map", ItemType::Charm, GiveAction::Map))
        .unwrap();
    b.register_item(item("Great_Slash", "Skill", ItemType::Charm, GiveAction::Bool))
        .unwrap();
    b.register_item(item("Grub", "Grub", ItemType::Charm, GiveAction::Grub))
        .unwrap();
    b.register_item(item("Grub-Crossroads_Acid", "Grub", ItemType::Charm, GiveAction::Grub))
        .unwrap();
    b.register_item(item("Mimic_Grub", "Mimic", ItemType::Charm, GiveAction::None))
        .unwrap();
    b.register_item(ItemDef {
        geo: 420,
        object: Some("Giant Geo Egg".into()),
        ..item("Geo_Rock-Outskirts420", "Rock", ItemType::Geo, GiveAction::None)
    })
    .unwrap();
    b.register_item(ItemDef {
        object: Some("Soul Totem 3".into()),
        ..item("Soul_Totem-Cliffs_Main", "Soul", ItemType::Soul, GiveAction::None)
    })
    .unwrap();
    b.register_item(ItemDef {
        geo: 160,
        ..item("Geo_Chest-Greenpath", "Geo", ItemType::Geo, GiveAction::None)
    })
    .unwrap();
    b.register_item(ItemDef {
        geo: 80,
        ..item("Geo_Chest-Mask_Maker", "Geo", ItemType::Geo, GiveAction::None)
    })
    .unwrap();
    b.register_item(ItemDef {
        lifeblood: 2,
        ..item("Lifeblood_Cocoon-Kings_Pass", "Lifeblood", ItemType::Lifeblood, GiveAction::None)
    })
    .unwrap();
    b.register_item(ItemDef {
        lore_key: Some("TUT_TAB_01".into()),
        ..item("Lore_Tablet-Kings_Pass_Focus", "Lore", ItemType::Lore, GiveAction::Lore)
    })
    .unwrap();
    b.register_item(item(
        "Grimmkin_Flame-City_Storerooms",
        "Flame",
        ItemType::Flame,
        GiveAction::None,
    ))
    .unwrap();

    b.register_shop(ShopDef {
        name: "Sly".into(),
        scene: "Room_shop".into(),
        object: "Shop Menu".into(),
        required_bool: String::new(),
        dung_discount: true,
    })
    .unwrap();
    b.register_shop(ShopDef {
        name: "Salubra".into(),
        scene: "Room_Charm_Shop".into(),
        object: "Shop Menu".into(),
        required_bool: String::new(),
        dung_discount: false,
    })
    .unwrap();

    b.register_additive_group(AdditiveGroup {
        name: "Dash".into(),
        items: vec!["Mothwing_Cloak".into(), "Shade_Cloak".into()],
    })
    .unwrap();

    b.build().unwrap()
}
