//! Edits applied to one FSM when it is enabled.

use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::catalog::{CostType, GiveAction, TextType};
use crate::content::{ShinyContent, shiny, write_shiny_content};
use crate::fsm::{Fsm, FsmError};
use crate::patch::PatchError;
use crate::step::{HostStep, RandoStep, kinds};

/// Host routine registered as a patch.
pub type FsmRoutine = Rc<dyn Fn(&mut Fsm) -> Result<(), PatchError>>;

/// A labelled closure over an FSM. Compares by label and identity.
#[derive(Clone)]
pub struct CustomFsmEdit {
    pub label: String,
    routine: FsmRoutine,
}

impl CustomFsmEdit {
    pub fn new<F>(label: &str, routine: F) -> Self
    where
        F: Fn(&mut Fsm) -> Result<(), PatchError> + 'static,
    {
        Self {
            label: label.to_string(),
            routine: Rc::new(routine),
        }
    }
}

impl fmt::Debug for CustomFsmEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFsmEdit")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomFsmEdit {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && Rc::ptr_eq(&self.routine, &other.routine)
    }
}

impl Serialize for CustomFsmEdit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}

// ---------------------------------------------------------------------------
// NPC reward sources
// ---------------------------------------------------------------------------

/// NPCs whose dialogue can hand out a placed item directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NpcKind {
    Nailmaster,
    Sly,
    CrystalShaman,
    SanctumShaman,
    Cornifer,
    CorniferDeepnest,
}

impl NpcKind {
    pub fn from_object(object: &str) -> Option<Self> {
        match object {
            "NM Sheo NPC" | "NM Mato NPC" | "NM Oro NPC" => Some(NpcKind::Nailmaster),
            "Sly Basement NPC" => Some(NpcKind::Sly),
            "Crystal Shaman" => Some(NpcKind::CrystalShaman),
            "Ruins Shaman" => Some(NpcKind::SanctumShaman),
            "Cornifer" => Some(NpcKind::Cornifer),
            "Cornifer Deepnest" => Some(NpcKind::CorniferDeepnest),
            _ => None,
        }
    }
}

/// Where the vanilla reward lives in an NPC's conversation FSM.
struct NpcLayout {
    check_state: &'static str,
    found_event: &'static str,
    give_state: &'static str,
}

fn npc_layout(npc: NpcKind) -> NpcLayout {
    match npc {
        NpcKind::Nailmaster => NpcLayout {
            check_state: "Init",
            found_event: "LEARNED",
            give_state: "Get Msg",
        },
        NpcKind::Sly => NpcLayout {
            check_state: "Check Active",
            found_event: "DESTROY",
            give_state: "Give Key",
        },
        NpcKind::CrystalShaman => NpcLayout {
            check_state: "Init",
            found_event: "GOT",
            give_state: "Spawn",
        },
        NpcKind::SanctumShaman => NpcLayout {
            check_state: "Init",
            found_event: "GOT",
            give_state: "Get Spell",
        },
        NpcKind::Cornifer | NpcKind::CorniferDeepnest => NpcLayout {
            check_state: "Check Active",
            found_event: "DESTROY",
            give_state: "Geo Pause and GetMap",
        },
    }
}

/// Host steps that hand out a vanilla reward.
const VANILLA_REWARD_KINDS: &[&str] = &[
    kinds::SET_PLAYER_DATA_BOOL,
    kinds::INCREMENT_PLAYER_DATA_INT,
    kinds::CREATE_OBJECT,
];

/// Edits look up everything they touch first, so a failed edit leaves the
/// FSM as it was.
fn require_states(fsm: &Fsm, states: &[&str]) -> Result<(), FsmError> {
    states.iter().try_for_each(|name| fsm.state(name).map(|_| ()))
}

fn require_step(fsm: &Fsm, state: &str, index: usize) -> Result<(), FsmError> {
    let len = fsm.state(state)?.step_count();
    if index < len {
        Ok(())
    } else {
        Err(FsmError::StepOutOfRange {
            state: state.to_string(),
            index,
            len,
        })
    }
}

fn require_transition(fsm: &Fsm, state: &str, event: &str) -> Result<(), FsmError> {
    fsm.state(state)?;
    fsm.find_transition(state, event)
        .map(|_| ())
        .ok_or_else(|| FsmError::TransitionNotFound {
            state: state.to_string(),
            event: event.to_string(),
        })
}

fn strip_vanilla_reward(fsm: &mut Fsm, state: &str) -> Result<(), PatchError> {
    let state = fsm.state_mut(state)?;
    for kind in VANILLA_REWARD_KINDS {
        state.remove_steps_of_kind(kind);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fixed names used by individual edits
// ---------------------------------------------------------------------------

const SHAMAN_MEETING: (&str, &str) = ("Shaman Meeting", "Conversation Control");
const CHECK_ACTIVE: &str = "Check Active";
const DESTROY: &str = "Destroy";
const SPAWN_ITEMS: &str = "Spawn Items";
const SPECIAL_TYPE: &str = "Special Type?";
const LORE_CHECK: &str = "Rando Lore";
const DESELECT: &str = "Deselect";
const LORE_EVENT: &str = "LORE";
const LORE_KEY_VARIABLE: &str = "Rando Lore Key";
const REWARD_CHECK: &str = "Init";
const REWARD_GIVE: &str = "Get";
const COLLECTED: &str = "COLLECTED";
const JOURNAL_BOOL: &str = "hasJournal";

// ---------------------------------------------------------------------------
// FsmEdit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FsmEdit {
    /// Deactivate an inspectable lore object as soon as it starts.
    DisableLoreTablet,
    /// Keep the object alive after its vanilla reward was collected.
    PreventSelfDestruct,
    ChangeNpcReward {
        npc: NpcKind,
        action: GiveAction,
        item: String,
        location: String,
    },
    ChangeShinyContent {
        item: String,
        location: String,
        content: ShinyContent,
    },
    ChangeChestGeo {
        item: String,
        location: String,
        geo: i32,
    },
    /// Replace the first bool test in `state` with a location check.
    ChangeBoolTest {
        state: String,
        location: String,
    },
    AddYesNoDialogue {
        name_key: String,
        cost: i32,
        cost_type: CostType,
    },
    ShowLoreTextInShop,
    ReplaceBluggsacReward {
        shiny_name: String,
    },
    /// Swap the vanilla reward in `state` for activating a placed shiny.
    ActivateShinyFromState {
        state: String,
        shiny_name: String,
    },
    /// The Hunter grants the journal from dialogue; reveal the placed shiny
    /// there instead.
    ReplaceJournalWithShiny {
        shiny_name: String,
    },
    ChangeGrimmkinReward {
        action: GiveAction,
        item: String,
        location: String,
    },
    ChangeBossEssenceReward {
        action: GiveAction,
        item: String,
        location: String,
    },
    Custom(CustomFsmEdit),
}

impl FsmEdit {
    pub fn name(&self) -> &'static str {
        match self {
            FsmEdit::DisableLoreTablet => "DisableLoreTablet",
            FsmEdit::PreventSelfDestruct => "PreventSelfDestruct",
            FsmEdit::ChangeNpcReward { .. } => "ChangeNpcReward",
            FsmEdit::ChangeShinyContent { .. } => "ChangeShinyContent",
            FsmEdit::ChangeChestGeo { .. } => "ChangeChestGeo",
            FsmEdit::ChangeBoolTest { .. } => "ChangeBoolTest",
            FsmEdit::AddYesNoDialogue { .. } => "AddYesNoDialogue",
            FsmEdit::ShowLoreTextInShop => "ShowLoreTextInShop",
            FsmEdit::ReplaceBluggsacReward { .. } => "ReplaceBluggsacReward",
            FsmEdit::ActivateShinyFromState { .. } => "ActivateShinyFromState",
            FsmEdit::ReplaceJournalWithShiny { .. } => "ReplaceJournalWithShiny",
            FsmEdit::ChangeGrimmkinReward { .. } => "ChangeGrimmkinReward",
            FsmEdit::ChangeBossEssenceReward { .. } => "ChangeBossEssenceReward",
            FsmEdit::Custom(_) => "Custom",
        }
    }

    pub fn apply(&self, fsm: &mut Fsm) -> Result<(), PatchError> {
        match self {
            FsmEdit::DisableLoreTablet => {
                let start = fsm
                    .start_state()
                    .map(|s| s.name().to_string())
                    .ok_or_else(|| PatchError::MissingComponent {
                        object: fsm.owner().to_string(),
                        component: "start state",
                    })?;
                fsm.state_mut(&start)?.add_first_step(RandoStep::Deactivate);
                Ok(())
            }
            FsmEdit::PreventSelfDestruct => prevent_self_destruct(fsm),
            FsmEdit::ChangeNpcReward {
                npc,
                action,
                item,
                location,
            } => change_npc_reward(fsm, *npc, *action, item, location),
            FsmEdit::ChangeShinyContent {
                item,
                location,
                content,
            } => Ok(write_shiny_content(fsm, item, location, content)?),
            FsmEdit::ChangeChestGeo {
                item,
                location,
                geo,
            } => {
                let spawn = fsm.state_mut(SPAWN_ITEMS)?;
                spawn.remove_steps_of_kind(kinds::FLING_OBJECTS);
                spawn.add_step(RandoStep::SpawnGeo { amount: *geo });
                spawn.add_step(RandoStep::give(GiveAction::None, item, location));
                Ok(())
            }
            FsmEdit::ChangeBoolTest { state, location } => change_bool_test(fsm, state, location),
            FsmEdit::AddYesNoDialogue {
                name_key,
                cost,
                cost_type,
            } => {
                require_transition(fsm, shiny::IDLE, shiny::TAKE)?;
                if fsm.find_state(shiny::COST_PROMPT).is_none() {
                    fsm.add_state(shiny::COST_PROMPT)?;
                }
                let prompt = fsm.state_mut(shiny::COST_PROMPT)?;
                prompt.clear_steps();
                prompt.add_step(RandoStep::YesNoPrompt {
                    name_key: name_key.clone(),
                    cost: *cost,
                    cost_type: *cost_type,
                });
                fsm.clear_transitions(shiny::COST_PROMPT)?;
                fsm.add_transition(shiny::COST_PROMPT, shiny::YES, shiny::CHARM)?;
                fsm.add_transition(shiny::COST_PROMPT, shiny::NO, shiny::IDLE)?;
                fsm.change_transition(shiny::IDLE, shiny::TAKE, shiny::COST_PROMPT)?;
                Ok(())
            }
            FsmEdit::ShowLoreTextInShop => show_lore_text_in_shop(fsm),
            FsmEdit::ReplaceBluggsacReward { shiny_name } => {
                require_step(fsm, "Init", 1)?;
                fsm.state_mut("Init")?.replace_step(
                    1,
                    RandoStep::SetObjectVariable {
                        variable: "Egg".to_string(),
                        path: format!("{shiny_name} Parent\\{shiny_name}"),
                    },
                )?;
                fsm.variables.get_or_create_object("Egg");
                Ok(())
            }
            FsmEdit::ReplaceJournalWithShiny { shiny_name } => {
                let (state, index) =
                    journal_grant(fsm).ok_or_else(|| PatchError::MissingComponent {
                        object: fsm.owner().to_string(),
                        component: "journal grant",
                    })?;
                fsm.state_mut(&state)?.replace_step(
                    index,
                    RandoStep::ActivateObject {
                        path: shiny_name.clone(),
                    },
                )?;
                Ok(())
            }
            FsmEdit::ActivateShinyFromState { state, shiny_name } => {
                strip_vanilla_reward(fsm, state)?;
                fsm.state_mut(state)?.add_step(RandoStep::ActivateObject {
                    path: shiny_name.clone(),
                });
                Ok(())
            }
            FsmEdit::ChangeGrimmkinReward {
                action,
                item,
                location,
            }
            | FsmEdit::ChangeBossEssenceReward {
                action,
                item,
                location,
            } => {
                require_states(fsm, &[REWARD_CHECK, REWARD_GIVE])?;
                fsm.state_mut(REWARD_CHECK)?
                    .add_first_step(RandoStep::check_found(location, COLLECTED));
                strip_vanilla_reward(fsm, REWARD_GIVE)?;
                fsm.state_mut(REWARD_GIVE)?
                    .add_step(RandoStep::give(*action, item, location));
                Ok(())
            }
            FsmEdit::Custom(custom) => (custom.routine)(fsm),
        }
    }
}

/// State and index of the step that sets the journal bool.
fn journal_grant(fsm: &Fsm) -> Option<(String, usize)> {
    fsm.states().find_map(|state| {
        state
            .steps()
            .iter()
            .position(|step| {
                step.as_any().downcast_ref::<HostStep>().is_some_and(|host| {
                    host.kind == kinds::SET_PLAYER_DATA_BOOL
                        && host.param("boolName") == Some(JOURNAL_BOOL)
                })
            })
            .map(|index| (state.name().to_string(), index))
    })
}

fn prevent_self_destruct(fsm: &mut Fsm) -> Result<(), PatchError> {
    if (fsm.owner(), fsm.name()) == SHAMAN_MEETING {
        fsm.state_mut(CHECK_ACTIVE)?
            .remove_steps_of_kind(kinds::DESTROY_SELF);
        fsm.clear_transitions(CHECK_ACTIVE)?;
        return Ok(());
    }
    let destroy = fsm.state_mut(DESTROY)?;
    destroy.remove_steps_of_kind(kinds::DESTROY_SELF);
    destroy.remove_steps_of_kind(kinds::ACTIVATE_GAME_OBJECT);
    Ok(())
}

fn change_npc_reward(
    fsm: &mut Fsm,
    npc: NpcKind,
    action: GiveAction,
    item: &str,
    location: &str,
) -> Result<(), PatchError> {
    let layout = npc_layout(npc);
    let action = action.without_spawn();
    let check = RandoStep::check_found(location, layout.found_event);

    match npc {
        NpcKind::Cornifer | NpcKind::CorniferDeepnest => {
            let deepnest = npc == NpcKind::CorniferDeepnest;
            require_step(fsm, layout.check_state, 0)?;
            require_step(fsm, "Convo Choice", 1)?;
            require_states(fsm, &[layout.give_state])?;
            if deepnest {
                require_states(fsm, &["Not At Deepnest"])?;
            }
            fsm.state_mut(layout.check_state)?.replace_step(0, check)?;
            fsm.state_mut("Convo Choice")?
                .replace_step(1, RandoStep::check_found(location, "BOUGHT"))?;

            let get = fsm.state_mut(layout.give_state)?;
            get.remove_last_steps(if deepnest { 1 } else { 5 });
            // Popup first so additive items show the right stage.
            get.add_step(RandoStep::ShowPopup {
                item: item.to_string(),
                name_key: String::new(),
                sprite_key: String::new(),
            });
            get.add_step(RandoStep::give(action, item, location));
            fsm.clear_transitions(layout.give_state)?;
            let finish = if deepnest { "Box Down Event 2" } else { "Box Up 3" };
            fsm.add_transition(layout.give_state, shiny::FINISHED, finish)?;

            if deepnest {
                // The other Cornifer location would otherwise disable this one.
                fsm.clear_transitions("Not At Deepnest")?;
                fsm.add_transition("Not At Deepnest", shiny::FINISHED, CHECK_ACTIVE)?;
            }
        }
        _ => {
            require_states(fsm, &[layout.check_state, layout.give_state])?;
            fsm.state_mut(layout.check_state)?.add_first_step(check);
            strip_vanilla_reward(fsm, layout.give_state)?;
            let give = fsm.state_mut(layout.give_state)?;
            give.add_step(RandoStep::ShowPopup {
                item: item.to_string(),
                name_key: String::new(),
                sprite_key: String::new(),
            });
            give.add_step(RandoStep::give(action, item, location));
        }
    }
    Ok(())
}

fn change_bool_test(fsm: &mut Fsm, state: &str, location: &str) -> Result<(), PatchError> {
    let owner = fsm.owner().to_string();
    let target = fsm.state_mut(state)?;
    let index = target
        .position_of_kind(kinds::PLAYER_DATA_BOOL_TEST)
        .or_else(|| target.position_of_kind(kinds::BOOL_TEST))
        .ok_or(PatchError::MissingComponent {
            object: owner,
            component: "bool test",
        })?;

    let (found_event, missing_event) = match target.step(index).and_then(|s| s.downcast_ref::<HostStep>()) {
        Some(test) => (
            test.param("isTrue").map(str::to_string),
            test.param("isFalse").map(str::to_string),
        ),
        None => (None, None),
    };
    target.replace_step(
        index,
        RandoStep::CheckLocation {
            location: location.to_string(),
            found_event,
            missing_event,
        },
    )?;
    Ok(())
}

fn show_lore_text_in_shop(fsm: &mut Fsm) -> Result<(), PatchError> {
    if fsm.find_state(LORE_CHECK).is_some() {
        return Ok(());
    }
    let lore = fsm.copy_state(SPECIAL_TYPE, LORE_CHECK)?;
    lore.clear_steps();
    lore.add_step(RandoStep::ShowText {
        key: LORE_KEY_VARIABLE.to_string(),
        sheet: "Lore Tablets".to_string(),
        text_type: TextType::Lore,
    });
    fsm.clear_transitions(LORE_CHECK)?;
    fsm.add_transition(LORE_CHECK, shiny::FINISHED, DESELECT)?;
    fsm.add_transition(SPECIAL_TYPE, LORE_EVENT, LORE_CHECK)?;
    fsm.variables.get_or_create_string(LORE_KEY_VARIABLE);
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::{FsmError, State};
    use crate::test_utils::{
        chest_fsm, cornifer_fsm, host, npc_fsm, reward_fsm, self_destruct_fsm, shiny_control_fsm,
        shop_confirm_fsm,
    };
    use std::cell::Cell;

    #[test]
    fn prevent_self_destruct_strips_destroy_state() {
        let mut fsm = self_destruct_fsm("Shiny Item", "Shiny Control");
        FsmEdit::PreventSelfDestruct.apply(&mut fsm).unwrap();
        let destroy = fsm.find_state(DESTROY).unwrap();
        assert!(destroy.find_step_of_kind(kinds::DESTROY_SELF).is_none());
        assert!(destroy.find_step_of_kind(kinds::ACTIVATE_GAME_OBJECT).is_none());
        assert_eq!(destroy.step_kinds(), vec!["Wait"]);
    }

    #[test]
    fn prevent_self_destruct_for_shaman_clears_check_active() {
        let mut fsm = self_destruct_fsm("Shaman Meeting", "Conversation Control");
        FsmEdit::PreventSelfDestruct.apply(&mut fsm).unwrap();
        let check = fsm.find_state(CHECK_ACTIVE).unwrap();
        assert!(check.find_step_of_kind(kinds::DESTROY_SELF).is_none());
        assert!(check.transitions().is_empty());
        // The ordinary destroy state is left alone.
        assert!(fsm
            .find_state(DESTROY)
            .unwrap()
            .find_step_of_kind(kinds::DESTROY_SELF)
            .is_some());
    }

    #[test]
    fn disable_lore_tablet_deactivates_on_start() {
        let mut fsm = shiny_control_fsm();
        FsmEdit::DisableLoreTablet.apply(&mut fsm).unwrap();
        let init = fsm.find_state(shiny::INIT).unwrap();
        assert_eq!(init.step(0).map(|s| s.kind()), Some(RandoStep::DEACTIVATE));
    }

    #[test]
    fn disable_lore_tablet_on_empty_fsm_fails() {
        let mut fsm = Fsm::new("Tut_tablet_top", "Inspection");
        assert!(matches!(
            FsmEdit::DisableLoreTablet.apply(&mut fsm),
            Err(PatchError::MissingComponent { .. })
        ));
    }

    #[test]
    fn cornifer_reward_rewires_map_purchase() {
        let mut fsm = cornifer_fsm(false);
        let edit = FsmEdit::ChangeNpcReward {
            npc: NpcKind::Cornifer,
            action: GiveAction::SpawnGeo,
            item: "Geo_Rock-Crossroads".into(),
            location: "Crossroads_Map".into(),
        };
        edit.apply(&mut fsm).unwrap();

        let get = fsm.find_state("Geo Pause and GetMap").unwrap();
        assert_eq!(
            get.step_kinds(),
            vec!["Wait", RandoStep::SHOW_POPUP, RandoStep::GIVE_ITEM]
        );
        assert_eq!(
            get.steps_of_type::<RandoStep>()[1],
            &RandoStep::give(GiveAction::AddGeo, "Geo_Rock-Crossroads", "Crossroads_Map")
        );
        assert_eq!(
            fsm.next_state("Geo Pause and GetMap", "FINISHED").map(State::name),
            Some("Box Up 3")
        );
        let convo = fsm.find_state("Convo Choice").unwrap();
        assert_eq!(convo.step(1).map(|s| s.kind()), Some(RandoStep::CHECK_LOCATION));
    }

    #[test]
    fn deepnest_cornifer_bypasses_other_location_check() {
        let mut fsm = cornifer_fsm(true);
        let edit = FsmEdit::ChangeNpcReward {
            npc: NpcKind::CorniferDeepnest,
            action: GiveAction::Map,
            item: "Deepnest_Map-Upper".into(),
            location: "Deepnest_Map-Right_[Gives_Quill]".into(),
        };
        edit.apply(&mut fsm).unwrap();
        assert_eq!(
            fsm.next_state("Not At Deepnest", "FINISHED").map(State::name),
            Some(CHECK_ACTIVE)
        );
        assert_eq!(
            fsm.next_state("Geo Pause and GetMap", "FINISHED").map(State::name),
            Some("Box Down Event 2")
        );
    }

    #[test]
    fn nailmaster_reward_replaces_vanilla_bool() {
        let mut fsm = npc_fsm("NM Sheo NPC", "Init", "Get Msg");
        let edit = FsmEdit::ChangeNpcReward {
            npc: NpcKind::Nailmaster,
            action: GiveAction::Bool,
            item: "Great_Slash".into(),
            location: "Great_Slash".into(),
        };
        edit.apply(&mut fsm).unwrap();
        let give = fsm.find_state("Get Msg").unwrap();
        assert!(give.find_step_of_kind(kinds::SET_PLAYER_DATA_BOOL).is_none());
        assert!(give.find_step_of_kind(RandoStep::GIVE_ITEM).is_some());
        let init = fsm.find_state("Init").unwrap();
        assert_eq!(init.step(0).map(|s| s.kind()), Some(RandoStep::CHECK_LOCATION));
    }

    #[test]
    fn npc_kind_from_object() {
        assert_eq!(NpcKind::from_object("NM Oro NPC"), Some(NpcKind::Nailmaster));
        assert_eq!(NpcKind::from_object("Ruins Shaman"), Some(NpcKind::SanctumShaman));
        assert_eq!(NpcKind::from_object("Shiny Item"), None);
    }

    #[test]
    fn chest_geo_replaces_fling() {
        let mut fsm = chest_fsm();
        FsmEdit::ChangeChestGeo {
            item: "Geo_Chest-Greenpath".into(),
            location: "Geo_Chest-Greenpath".into(),
            geo: 160,
        }
        .apply(&mut fsm)
        .unwrap();
        let spawn = fsm.find_state(SPAWN_ITEMS).unwrap();
        assert!(spawn.find_step_of_kind(kinds::FLING_OBJECTS).is_none());
        assert_eq!(
            spawn.step_of_type::<RandoStep>(),
            Some(&RandoStep::SpawnGeo { amount: 160 })
        );
    }

    #[test]
    fn bool_test_becomes_location_check_keeping_events() {
        let mut fsm = Fsm::new("PreDreamnail", "FSM");
        fsm.add_state("Check").unwrap().add_step(
            host(kinds::PLAYER_DATA_BOOL_TEST)
                .with_param("isTrue", "DEACTIVATE")
                .with_param("isFalse", "ACTIVATE"),
        );
        FsmEdit::ChangeBoolTest {
            state: "Check".into(),
            location: "Dream_Nail".into(),
        }
        .apply(&mut fsm)
        .unwrap();
        let check = fsm.find_state("Check").unwrap();
        assert_eq!(
            check.step_of_type::<RandoStep>(),
            Some(&RandoStep::CheckLocation {
                location: "Dream_Nail".into(),
                found_event: Some("DEACTIVATE".into()),
                missing_event: Some("ACTIVATE".into()),
            })
        );
        assert_eq!(check.step_count(), 1);
    }

    #[test]
    fn bool_test_missing_is_an_error() {
        let mut fsm = Fsm::new("PreDreamnail", "FSM");
        fsm.add_state("Check").unwrap();
        let err = FsmEdit::ChangeBoolTest {
            state: "Check".into(),
            location: "Dream_Nail".into(),
        }
        .apply(&mut fsm)
        .unwrap_err();
        assert!(matches!(err, PatchError::MissingComponent { component: "bool test", .. }));
    }

    #[test]
    fn yes_no_dialogue_gates_take() {
        let mut fsm = shiny_control_fsm();
        FsmEdit::AddYesNoDialogue {
            name_key: "CHARM_NAME_2".into(),
            cost: 300,
            cost_type: CostType::Essence,
        }
        .apply(&mut fsm)
        .unwrap();
        assert_eq!(
            fsm.next_state(shiny::IDLE, shiny::TAKE).map(State::name),
            Some(shiny::COST_PROMPT)
        );
        assert_eq!(
            fsm.next_state(shiny::COST_PROMPT, shiny::YES).map(State::name),
            Some(shiny::CHARM)
        );
        assert_eq!(
            fsm.next_state(shiny::COST_PROMPT, shiny::NO).map(State::name),
            Some(shiny::IDLE)
        );
        assert!(fsm.dangling_transitions().is_empty());
    }

    #[test]
    fn yes_no_dialogue_without_take_adds_nothing() {
        let mut fsm = shiny_control_fsm();
        fsm.remove_transition(shiny::IDLE, shiny::TAKE).unwrap();
        let err = FsmEdit::AddYesNoDialogue {
            name_key: "CHARM_NAME_2".into(),
            cost: 300,
            cost_type: CostType::Essence,
        }
        .apply(&mut fsm)
        .unwrap_err();
        assert!(matches!(err, PatchError::Fsm(FsmError::TransitionNotFound { .. })));
        assert!(fsm.find_state(shiny::COST_PROMPT).is_none());
    }

    #[test]
    fn npc_reward_with_wrong_layout_leaves_check_state() {
        let mut fsm = npc_fsm("NM Sheo NPC", "Init", "Get");
        let err = FsmEdit::ChangeNpcReward {
            npc: NpcKind::Nailmaster,
            action: GiveAction::Bool,
            item: "Great_Slash".into(),
            location: "Great_Slash".into(),
        }
        .apply(&mut fsm)
        .unwrap_err();
        assert!(matches!(err, PatchError::Fsm(FsmError::StateNotFound(ref name)) if name == "Get Msg"));
        let init = fsm.find_state("Init").unwrap();
        assert_eq!(init.step_kinds(), vec![kinds::PLAYER_DATA_BOOL_TEST]);
    }

    #[test]
    fn lore_in_shop_is_idempotent() {
        let mut fsm = shop_confirm_fsm();
        FsmEdit::ShowLoreTextInShop.apply(&mut fsm).unwrap();
        FsmEdit::ShowLoreTextInShop.apply(&mut fsm).unwrap();
        assert_eq!(
            fsm.next_state(SPECIAL_TYPE, LORE_EVENT).map(State::name),
            Some(LORE_CHECK)
        );
        assert_eq!(
            fsm.next_state(LORE_CHECK, shiny::FINISHED).map(State::name),
            Some(DESELECT)
        );
        assert_eq!(
            fsm.find_state(SPECIAL_TYPE).unwrap().transitions().len(),
            2
        );
    }

    #[test]
    fn bluggsac_reward_points_egg_at_shiny() {
        let mut fsm = Fsm::new("Corpse Egg Sac", "Control");
        let init = fsm.add_state("Init").unwrap();
        init.add_step(host("GetOwner"));
        init.add_step(host(kinds::CREATE_OBJECT));
        FsmEdit::ReplaceBluggsacReward {
            shiny_name: "Randomizer Shiny 4".into(),
        }
        .apply(&mut fsm)
        .unwrap();
        let init = fsm.find_state("Init").unwrap();
        assert_eq!(
            init.step(1).and_then(|s| s.downcast_ref::<RandoStep>()),
            Some(&RandoStep::SetObjectVariable {
                variable: "Egg".into(),
                path: "Randomizer Shiny 4 Parent\\Randomizer Shiny 4".into(),
            })
        );
        assert!(fsm.variables.find_object("Egg").is_some());
    }

    #[test]
    fn bluggsac_without_egg_step_is_untouched() {
        let mut fsm = Fsm::new("Corpse Egg Sac", "Control");
        fsm.add_state("Init").unwrap().add_step(host("GetOwner"));
        let err = FsmEdit::ReplaceBluggsacReward {
            shiny_name: "Randomizer Shiny 4".into(),
        }
        .apply(&mut fsm)
        .unwrap_err();
        assert!(matches!(err, PatchError::Fsm(FsmError::StepOutOfRange { .. })));
        assert!(fsm.variables.find_object("Egg").is_none());
    }

    fn hunter_fsm() -> Fsm {
        let mut fsm = npc_fsm("Hunter NPC", "Convo Choice", "Journal Get");
        fsm.state_mut("Journal Get").unwrap().replace_step(
            0,
            host(kinds::SET_PLAYER_DATA_BOOL).with_param("boolName", JOURNAL_BOOL),
        )
        .unwrap();
        fsm
    }

    #[test]
    fn journal_grant_reveals_shiny() {
        let mut fsm = hunter_fsm();
        FsmEdit::ReplaceJournalWithShiny {
            shiny_name: "Randomizer Shiny 2".into(),
        }
        .apply(&mut fsm)
        .unwrap();
        let get = fsm.find_state("Journal Get").unwrap();
        assert_eq!(
            get.step_kinds(),
            vec![RandoStep::ACTIVATE_OBJECT, kinds::SEND_EVENT_BY_NAME]
        );
        assert_eq!(
            get.step_of_type::<RandoStep>(),
            Some(&RandoStep::ActivateObject {
                path: "Randomizer Shiny 2".into()
            })
        );
    }

    #[test]
    fn journal_edit_needs_a_journal_grant() {
        let mut fsm = npc_fsm("Hunter NPC", "Convo Choice", "Journal Get");
        let before = fsm.find_state("Journal Get").unwrap().step_kinds().len();
        let err = FsmEdit::ReplaceJournalWithShiny {
            shiny_name: "Randomizer Shiny 2".into(),
        }
        .apply(&mut fsm)
        .unwrap_err();
        assert!(matches!(err, PatchError::MissingComponent { component: "journal grant", .. }));
        assert_eq!(fsm.find_state("Journal Get").unwrap().step_kinds().len(), before);
    }

    #[test]
    fn grimmkin_reward_checks_and_gives() {
        let mut fsm = reward_fsm("Flamebearer Spawn", "Spawn Control");
        FsmEdit::ChangeGrimmkinReward {
            action: GiveAction::Charm,
            item: "Wayward_Compass".into(),
            location: "Grimmkin_Flame-City_Storerooms".into(),
        }
        .apply(&mut fsm)
        .unwrap();
        let get = fsm.find_state(REWARD_GIVE).unwrap();
        assert!(get.find_step_of_kind(kinds::INCREMENT_PLAYER_DATA_INT).is_none());
        assert!(get.find_step_of_kind(RandoStep::GIVE_ITEM).is_some());
    }

    #[test]
    fn reward_edit_without_give_state_leaves_check() {
        let mut fsm = Fsm::new("Boss Essence", "Control");
        fsm.add_state(REWARD_CHECK).unwrap();
        let err = FsmEdit::ChangeBossEssenceReward {
            action: GiveAction::Essence,
            item: "Dream_Gate".into(),
            location: "Boss_Essence-Elder_Hu".into(),
        }
        .apply(&mut fsm)
        .unwrap_err();
        assert!(matches!(err, PatchError::Fsm(FsmError::StateNotFound(ref name)) if name == REWARD_GIVE));
        assert_eq!(fsm.find_state(REWARD_CHECK).unwrap().step_count(), 0);
    }

    #[test]
    fn custom_routine_runs() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let edit = FsmEdit::Custom(CustomFsmEdit::new("count", move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        }));
        let mut fsm = shiny_control_fsm();
        edit.apply(&mut fsm).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(serde_json::to_string(&edit).unwrap(), r#"{"Custom":"count"}"#);
    }
}
