//! Steps: the atomic behavior units executed while a state is active.
//!
//! The host supplies an open-ended set of step kinds, so the FSM model only
//! relies on the [`Step`] trait: a `kind()` tag for filter/remove queries and
//! an `as_any` hook for typed downcasts. [`HostStep`] stands in for any step
//! the patcher does not interpret; [`RandoStep`] is the closed set of steps
//! the patch routines insert.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::catalog::{CostType, GiveAction, TextType};
use crate::content::BigItemDef;

// ---------------------------------------------------------------------------
// Step trait
// ---------------------------------------------------------------------------

/// One unit of behavior inside a state.
pub trait Step: fmt::Debug {
    /// The kind tag used by `find_step_of_kind` and friends.
    fn kind(&self) -> &str;

    /// Clone behind the trait object. Needed by `copy_state`.
    fn box_clone(&self) -> Box<dyn Step>;

    /// Downcast to `&dyn Any` for type-safe access to concrete step types.
    fn as_any(&self) -> &dyn Any;

    /// Downcast to `&mut dyn Any` for type-safe mutable access to concrete step types.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn Step> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl<'a> dyn Step + 'a {
    /// Borrow this step as a concrete type, if it is one.
    pub fn downcast_ref<T: Step + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow this step as a concrete type, if it is one.
    pub fn downcast_mut<T: Step + 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

// ---------------------------------------------------------------------------
// Host step kinds the patch routines look for
// ---------------------------------------------------------------------------

/// Kind tags of host steps that patch routines remove or rewrite.
pub mod kinds {
    pub const DESTROY_SELF: &str = "DestroySelf";
    pub const ACTIVATE_GAME_OBJECT: &str = "ActivateGameObject";
    pub const BOOL_TEST: &str = "BoolTest";
    pub const PLAYER_DATA_BOOL_TEST: &str = "PlayerDataBoolTest";
    pub const SEND_EVENT_BY_NAME: &str = "SendEventByName";
    pub const SET_PARENT: &str = "SetParent";
    pub const FLING_OBJECTS: &str = "FlingObjectsFromGlobalPool";
    pub const SET_PLAYER_DATA_BOOL: &str = "SetPlayerDataBool";
    pub const INCREMENT_PLAYER_DATA_INT: &str = "IncrementPlayerDataInt";
    pub const CREATE_OBJECT: &str = "CreateObject";
}

// ---------------------------------------------------------------------------
// HostStep
// ---------------------------------------------------------------------------

/// A host-owned step. The patcher only reads its kind and string parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HostStep {
    pub kind: String,
    pub params: BTreeMap<String, String>,
}

impl HostStep {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl Step for HostStep {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// RandoStep
// ---------------------------------------------------------------------------

/// When a deferred shiny becomes active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationCondition {
    /// A player-data bool is set (usually an enemy kill flag).
    PlayerDataBool(String),
    /// A scene-persistent bool is set.
    SceneData { scene: String, id: String },
    /// Enough rancid eggs have been sold.
    EggsSold(i32),
    /// Activated explicitly by a death patch.
    OnDeath,
}

/// Steps inserted by patch routines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RandoStep {
    GiveItem {
        action: GiveAction,
        item: String,
        location: String,
    },
    ShowPopup {
        item: String,
        name_key: String,
        sprite_key: String,
    },
    ShowBigItem {
        defs: Vec<BigItemDef>,
    },
    SpawnGeo {
        amount: i32,
    },
    SpawnLifeblood {
        count: i32,
    },
    AddSoul,
    ShowText {
        key: String,
        sheet: String,
        text_type: TextType,
    },
    /// Sends `found_event` when the location is already collected, otherwise
    /// `missing_event` (no event when `None`).
    CheckLocation {
        location: String,
        found_event: Option<String>,
        missing_event: Option<String>,
    },
    ActivateObject {
        path: String,
    },
    ActivateWhen {
        condition: ActivationCondition,
        child: String,
    },
    Deactivate,
    YesNoPrompt {
        name_key: String,
        cost: i32,
        cost_type: CostType,
    },
    SetObjectVariable {
        variable: String,
        path: String,
    },
}

impl RandoStep {
    pub const GIVE_ITEM: &'static str = "RandoGiveItem";
    pub const SHOW_POPUP: &'static str = "RandoShowPopup";
    pub const SHOW_BIG_ITEM: &'static str = "RandoShowBigItem";
    pub const SPAWN_GEO: &'static str = "RandoSpawnGeo";
    pub const SPAWN_LIFEBLOOD: &'static str = "RandoSpawnLifeblood";
    pub const ADD_SOUL: &'static str = "RandoAddSoul";
    pub const SHOW_TEXT: &'static str = "RandoShowText";
    pub const CHECK_LOCATION: &'static str = "RandoCheckLocation";
    pub const ACTIVATE_OBJECT: &'static str = "RandoActivateObject";
    pub const ACTIVATE_WHEN: &'static str = "RandoActivateWhen";
    pub const DEACTIVATE: &'static str = "RandoDeactivate";
    pub const YES_NO_PROMPT: &'static str = "RandoYesNoPrompt";
    pub const SET_OBJECT_VARIABLE: &'static str = "RandoSetObjectVariable";

    pub fn give(action: GiveAction, item: &str, location: &str) -> Self {
        RandoStep::GiveItem {
            action,
            item: item.to_string(),
            location: location.to_string(),
        }
    }

    /// A location check that only fires when the location was collected.
    pub fn check_found(location: &str, event: &str) -> Self {
        RandoStep::CheckLocation {
            location: location.to_string(),
            found_event: Some(event.to_string()),
            missing_event: None,
        }
    }
}

impl Step for RandoStep {
    fn kind(&self) -> &str {
        match self {
            RandoStep::GiveItem { .. } => Self::GIVE_ITEM,
            RandoStep::ShowPopup { .. } => Self::SHOW_POPUP,
            RandoStep::ShowBigItem { .. } => Self::SHOW_BIG_ITEM,
            RandoStep::SpawnGeo { .. } => Self::SPAWN_GEO,
            RandoStep::SpawnLifeblood { .. } => Self::SPAWN_LIFEBLOOD,
            RandoStep::AddSoul => Self::ADD_SOUL,
            RandoStep::ShowText { .. } => Self::SHOW_TEXT,
            RandoStep::CheckLocation { .. } => Self::CHECK_LOCATION,
            RandoStep::ActivateObject { .. } => Self::ACTIVATE_OBJECT,
            RandoStep::ActivateWhen { .. } => Self::ACTIVATE_WHEN,
            RandoStep::Deactivate => Self::DEACTIVATE,
            RandoStep::YesNoPrompt { .. } => Self::YES_NO_PROMPT,
            RandoStep::SetObjectVariable { .. } => Self::SET_OBJECT_VARIABLE,
        }
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_step_reports_its_kind() {
        let step = HostStep::new(kinds::DESTROY_SELF);
        assert_eq!(step.kind(), "DestroySelf");
    }

    #[test]
    fn host_step_params() {
        let step = HostStep::new(kinds::BOOL_TEST).with_param("isTrue", "FOUND");
        assert_eq!(step.param("isTrue"), Some("FOUND"));
        assert_eq!(step.param("isFalse"), None);
    }

    #[test]
    fn rando_step_kinds_are_distinct_from_host_kinds() {
        let give = RandoStep::give(GiveAction::Charm, "Grubsong", "Grubsong");
        assert_eq!(give.kind(), RandoStep::GIVE_ITEM);
        assert_ne!(give.kind(), kinds::SET_PLAYER_DATA_BOOL);
    }

    #[test]
    fn boxed_step_clones_and_downcasts() {
        let boxed: Box<dyn Step> = Box::new(RandoStep::SpawnGeo { amount: 80 });
        let copy = boxed.clone();
        assert_eq!(
            copy.downcast_ref::<RandoStep>(),
            Some(&RandoStep::SpawnGeo { amount: 80 })
        );
        assert!(copy.downcast_ref::<HostStep>().is_none());
    }

    #[test]
    fn downcast_mut_edits_in_place() {
        let mut boxed: Box<dyn Step> = Box::new(HostStep::new("SetParent"));
        if let Some(host) = boxed.downcast_mut::<HostStep>() {
            host.params.insert("gameObject".into(), "Dialogue".into());
        }
        let host = boxed.downcast_ref::<HostStep>().unwrap();
        assert_eq!(host.param("gameObject"), Some("Dialogue"));
    }

    #[test]
    fn rando_step_serializes_with_tag() {
        let json = serde_json::to_string(&RandoStep::AddSoul).unwrap();
        assert_eq!(json, r#"{"step":"add_soul"}"#);
    }
}
