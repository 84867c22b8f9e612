//! Compiled patch actions and the registry that holds them.
//!
//! A [`PatchAction`] is a value: an immutable match predicate plus the
//! parameters of one edit. Dispatch hands it the matched host handle and the
//! edit performs its mutation.

use serde::Serialize;

use crate::death_edit::DeathEdit;
use crate::fsm::{Fsm, FsmError};
use crate::fsm_edit::FsmEdit;
use crate::id::ObjectId;
use crate::object_edit::ObjectEdit;
use crate::prefab::PrefabFactory;
use crate::scene::{Scene, SceneError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a patch failed to apply. Logged by the dispatcher, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Fsm(#[from] FsmError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("object {object} has no fsm named {fsm}")]
    MissingFsm { object: String, fsm: String },
    #[error("{object} has no {component}")]
    MissingComponent {
        object: String,
        component: &'static str,
    },
    #[error("prefab unavailable: {0}")]
    Prefab(String),
    #[error("{0}")]
    Custom(String),
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// The three patch variants, by the host event that triggers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PatchKind {
    Object,
    Fsm,
    Death,
}

/// How an FSM patch matches its owning object's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectMatch {
    Exact(String),
    Prefix(String),
}

impl ObjectMatch {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            ObjectMatch::Exact(expected) => name == expected,
            ObjectMatch::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// Runs when objects in `scene` appear. Finds its own target by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectPatch {
    pub scene: String,
    pub edit: ObjectEdit,
}

impl ObjectPatch {
    pub fn apply(&self, scene: &mut Scene, factory: &dyn PrefabFactory) -> Result<(), PatchError> {
        self.edit.apply(&self.scene, scene, factory)
    }
}

/// Runs when the FSM `(scene, object, fsm)` is enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FsmPatch {
    pub scene: String,
    pub object: ObjectMatch,
    pub fsm: String,
    pub edit: FsmEdit,
}

impl FsmPatch {
    pub fn matches(&self, scene: &str, object: &str, fsm: &str) -> bool {
        self.scene == scene && self.fsm == fsm && self.object.matches(object)
    }

    pub fn apply(&self, fsm: &mut Fsm) -> Result<(), PatchError> {
        self.edit.apply(fsm)
    }
}

/// Runs when an entity in `scene` dies, before the host's own death handling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeathPatch {
    pub scene: String,
    pub edit: DeathEdit,
}

impl DeathPatch {
    pub fn apply(&self, scene: &mut Scene, entity: ObjectId) -> Result<(), PatchError> {
        self.edit.apply(scene, entity)
    }
}

// ---------------------------------------------------------------------------
// PatchAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum PatchAction {
    Object(ObjectPatch),
    Fsm(FsmPatch),
    Death(DeathPatch),
}

impl PatchAction {
    pub fn object(scene: &str, edit: ObjectEdit) -> Self {
        PatchAction::Object(ObjectPatch {
            scene: scene.to_string(),
            edit,
        })
    }

    pub fn fsm(scene: &str, object: &str, fsm: &str, edit: FsmEdit) -> Self {
        PatchAction::Fsm(FsmPatch {
            scene: scene.to_string(),
            object: ObjectMatch::Exact(object.to_string()),
            fsm: fsm.to_string(),
            edit,
        })
    }

    /// An FSM patch matching every object whose name starts with `prefix`.
    pub fn fsm_prefix(scene: &str, prefix: &str, fsm: &str, edit: FsmEdit) -> Self {
        PatchAction::Fsm(FsmPatch {
            scene: scene.to_string(),
            object: ObjectMatch::Prefix(prefix.to_string()),
            fsm: fsm.to_string(),
            edit,
        })
    }

    pub fn death(scene: &str, edit: DeathEdit) -> Self {
        PatchAction::Death(DeathPatch {
            scene: scene.to_string(),
            edit,
        })
    }

    pub fn kind(&self) -> PatchKind {
        match self {
            PatchAction::Object(_) => PatchKind::Object,
            PatchAction::Fsm(_) => PatchKind::Fsm,
            PatchAction::Death(_) => PatchKind::Death,
        }
    }

    pub fn scene(&self) -> &str {
        match self {
            PatchAction::Object(p) => &p.scene,
            PatchAction::Fsm(p) => &p.scene,
            PatchAction::Death(p) => &p.scene,
        }
    }

    /// Short name of the edit, e.g. `"CreateNewShiny"`.
    pub fn edit_name(&self) -> &'static str {
        match self {
            PatchAction::Object(p) => p.edit.name(),
            PatchAction::Fsm(p) => p.edit.name(),
            PatchAction::Death(p) => p.edit.name(),
        }
    }

    /// Parameters as JSON, for diagnostics.
    pub fn params_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}

// ---------------------------------------------------------------------------
// PatchRegistry
// ---------------------------------------------------------------------------

/// Ordered output of one compile. Replaced wholesale, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchRegistry {
    actions: Vec<PatchAction>,
}

impl PatchRegistry {
    pub fn new(actions: Vec<PatchAction>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[PatchAction] {
        &self.actions
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatchAction> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn count(&self, kind: PatchKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }

    pub fn object_patches(&self) -> impl Iterator<Item = &ObjectPatch> {
        self.actions.iter().filter_map(|a| match a {
            PatchAction::Object(p) => Some(p),
            _ => None,
        })
    }

    pub fn fsm_patches(&self) -> impl Iterator<Item = &FsmPatch> {
        self.actions.iter().filter_map(|a| match a {
            PatchAction::Fsm(p) => Some(p),
            _ => None,
        })
    }

    pub fn death_patches(&self) -> impl Iterator<Item = &DeathPatch> {
        self.actions.iter().filter_map(|a| match a {
            PatchAction::Death(p) => Some(p),
            _ => None,
        })
    }

    /// Edit names in order, for compact assertions and logs.
    pub fn edit_names(&self) -> Vec<&'static str> {
        self.actions.iter().map(PatchAction::edit_name).collect()
    }
}

impl<'a> IntoIterator for &'a PatchRegistry {
    type Item = &'a PatchAction;
    type IntoIter = std::slice::Iter<'a, PatchAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_match_exact_and_prefix() {
        assert!(ObjectMatch::Exact("Egg Sac".into()).matches("Egg Sac"));
        assert!(!ObjectMatch::Exact("Egg Sac".into()).matches("Egg Sac (1)"));
        assert!(ObjectMatch::Prefix("Corpse Egg Sac".into()).matches("Corpse Egg Sac (2)"));
        assert!(!ObjectMatch::Prefix("Corpse Egg Sac".into()).matches("Egg Sac"));
    }

    #[test]
    fn fsm_patch_matches_full_triple() {
        let action = PatchAction::fsm("X", "Y", "Z", FsmEdit::PreventSelfDestruct);
        let PatchAction::Fsm(patch) = &action else {
            panic!("expected fsm patch");
        };
        assert!(patch.matches("X", "Y", "Z"));
        assert!(!patch.matches("X", "W", "Z"));
        assert!(!patch.matches("X", "Y", "Q"));
        assert!(!patch.matches("V", "Y", "Z"));
    }

    #[test]
    fn registry_counts_by_kind() {
        let registry = PatchRegistry::new(vec![
            PatchAction::fsm("A", "B", "C", FsmEdit::PreventSelfDestruct),
            PatchAction::fsm("A", "B", "C", FsmEdit::DisableLoreTablet),
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.count(PatchKind::Fsm), 2);
        assert_eq!(registry.count(PatchKind::Object), 0);
        assert_eq!(
            registry.edit_names(),
            vec!["PreventSelfDestruct", "DisableLoreTablet"]
        );
    }

    #[test]
    fn params_json_includes_predicate() {
        let action = PatchAction::fsm("Tutorial_01", "Tut_tablet_top", "Inspection", FsmEdit::DisableLoreTablet);
        let json = action.params_json();
        assert!(json.contains("\"kind\":\"Fsm\""));
        assert!(json.contains("Tut_tablet_top"));
    }
}
