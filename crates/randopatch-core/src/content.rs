//! What a pickup hands over, and how that content is written into a shiny's
//! control FSM.

use serde::{Deserialize, Serialize};

use crate::catalog::{GiveAction, ItemDef, TextType};
use crate::fsm::{Fsm, FsmError};
use crate::step::RandoStep;

/// State and event names of the shiny control FSM.
pub mod shiny {
    pub const FSM: &str = "Shiny Control";
    pub const INIT: &str = "Init";
    pub const IDLE: &str = "Idle";
    pub const CHARM: &str = "Charm?";
    pub const TRINK_FLASH: &str = "Trink Flash";
    pub const BIG_GET_FLASH: &str = "Big Get Flash";
    pub const FINISH: &str = "Finish";
    pub const TEXT: &str = "Rando Text";
    pub const COST_PROMPT: &str = "Rando Cost Prompt";
    pub const TAKE: &str = "TAKE";
    pub const FINISHED: &str = "FINISHED";
    pub const YES: &str = "YES";
    pub const NO: &str = "NO";
    /// String variable naming the location the shiny belongs to.
    pub const ITEM_LOCATION: &str = "Rando Location";
}

/// One page of a big item popup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BigItemDef {
    pub item: String,
    pub sprite_key: String,
    pub take_key: String,
    pub name_key: String,
    pub button_key: String,
    pub desc_one_key: String,
    pub desc_two_key: String,
}

impl BigItemDef {
    pub fn from_item(item: &ItemDef) -> Self {
        Self {
            item: item.name.clone(),
            sprite_key: item.big_sprite_key.clone(),
            take_key: item.take_key.clone(),
            name_key: item.name_key.clone(),
            button_key: item.button_key.clone(),
            desc_one_key: item.desc_one_key.clone(),
            desc_two_key: item.desc_two_key.clone(),
        }
    }
}

/// One line of a shop's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopEntry {
    /// Player-data bool set when the entry is bought.
    pub bool_name: String,
    pub name_key: String,
    pub desc_key: String,
    pub sprite_key: String,
    pub cost: i32,
    pub required_bool: String,
    pub dung_discount: bool,
    pub notch_cost_bool: Option<String>,
    /// The entry pays out geo rather than an item.
    pub currency: bool,
}

/// Type-specific content of a shiny pickup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "content", rename_all = "snake_case")]
pub enum ShinyContent {
    Item {
        action: GiveAction,
        name_key: String,
        sprite_key: String,
    },
    BigItem {
        action: GiveAction,
        defs: Vec<BigItemDef>,
    },
    Geo {
        amount: i32,
    },
    Lifeblood {
        count: i32,
    },
    Soul,
    Text {
        action: GiveAction,
        key: String,
        sheet: String,
        text_type: TextType,
    },
}

/// Content together with the placement it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedContent {
    pub item: String,
    pub location: String,
    pub content: ShinyContent,
}

/// Rewrite the `Charm?` state so collecting the shiny grants `content`.
pub fn write_shiny_content(
    fsm: &mut Fsm,
    item: &str,
    location: &str,
    content: &ShinyContent,
) -> Result<(), FsmError> {
    fsm.state(shiny::CHARM)?;
    if matches!(content, ShinyContent::BigItem { .. }) {
        fsm.state(shiny::BIG_GET_FLASH)?;
    }

    fsm.variables.get_or_create_string(shiny::ITEM_LOCATION).value = location.to_string();

    let charm = fsm.state_mut(shiny::CHARM)?;
    charm.clear_steps();
    let next = match content {
        ShinyContent::Item {
            action,
            name_key,
            sprite_key,
        } => {
            charm.add_step(RandoStep::ShowPopup {
                item: item.to_string(),
                name_key: name_key.clone(),
                sprite_key: sprite_key.clone(),
            });
            charm.add_step(RandoStep::give(*action, item, location));
            shiny::TRINK_FLASH
        }
        ShinyContent::BigItem { action, defs } => {
            charm.add_step(RandoStep::give(*action, item, location));
            let flash = fsm.state_mut(shiny::BIG_GET_FLASH)?;
            flash.remove_steps_of_kind(RandoStep::SHOW_BIG_ITEM);
            flash.add_first_step(RandoStep::ShowBigItem { defs: defs.clone() });
            shiny::BIG_GET_FLASH
        }
        ShinyContent::Geo { amount } => {
            charm.add_step(RandoStep::SpawnGeo { amount: *amount });
            charm.add_step(RandoStep::give(GiveAction::None, item, location));
            shiny::FINISH
        }
        ShinyContent::Lifeblood { count } => {
            charm.add_step(RandoStep::SpawnLifeblood { count: *count });
            charm.add_step(RandoStep::give(GiveAction::None, item, location));
            shiny::FINISH
        }
        ShinyContent::Soul => {
            charm.add_step(RandoStep::AddSoul);
            charm.add_step(RandoStep::give(GiveAction::None, item, location));
            shiny::FINISH
        }
        ShinyContent::Text {
            action,
            key,
            sheet,
            text_type,
        } => {
            charm.add_step(RandoStep::give(*action, item, location));
            if fsm.find_state(shiny::TEXT).is_none() {
                fsm.add_state(shiny::TEXT)?;
                fsm.add_transition(shiny::TEXT, shiny::FINISHED, shiny::FINISH)?;
            }
            let text = fsm.state_mut(shiny::TEXT)?;
            text.clear_steps();
            text.add_step(RandoStep::ShowText {
                key: key.clone(),
                sheet: sheet.clone(),
                text_type: *text_type,
            });
            shiny::TEXT
        }
    };

    fsm.clear_transitions(shiny::CHARM)?;
    fsm.add_transition(shiny::CHARM, shiny::FINISHED, next)?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
