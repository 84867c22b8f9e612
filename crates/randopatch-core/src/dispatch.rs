//! Runtime dispatch of compiled patches against host events.
//!
//! The dispatcher owns the current [`PatchRegistry`] and exposes one intake
//! per host event. Every intake filters the registry, applies each matching
//! patch in registry order and reports what happened. A patch that fails is
//! logged with its parameters and skipped; the rest of the batch still runs.

use std::ops::AddAssign;

use tracing::{debug, error};

use crate::fsm::Fsm;
use crate::id::ObjectId;
use crate::patch::{PatchAction, PatchError, PatchRegistry};
use crate::prefab::PrefabFactory;
use crate::scene::Scene;

/// Outcome of one intake call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Patches whose predicate matched the event.
    pub matched: usize,
    pub applied: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn record(&mut self, action: &PatchAction, result: Result<(), PatchError>) {
        self.matched += 1;
        match result {
            Ok(()) => self.applied += 1,
            Err(err) => {
                self.failed += 1;
                error!(
                    kind = ?action.kind(),
                    scene = action.scene(),
                    edit = action.edit_name(),
                    params = %action.params_json(),
                    error = %err,
                    "patch failed to apply"
                );
            }
        }
    }
}

impl AddAssign for DispatchReport {
    fn add_assign(&mut self, rhs: Self) {
        self.matched += rhs.matched;
        self.applied += rhs.applied;
        self.failed += rhs.failed;
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Idle until a registry is loaded; loading again replaces it wholesale.
#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: Option<PatchRegistry>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `registry`, returning the one it replaces.
    pub fn load(&mut self, registry: PatchRegistry) -> Option<PatchRegistry> {
        debug!(patches = registry.len(), "patch registry loaded");
        self.registry.replace(registry)
    }

    pub fn is_loaded(&self) -> bool {
        self.registry.is_some()
    }

    pub fn registry(&self) -> Option<&PatchRegistry> {
        self.registry.as_ref()
    }

    fn actions(&self) -> &[PatchAction] {
        match &self.registry {
            Some(registry) => registry.actions(),
            None => &[],
        }
    }

    /// Objects of `scene` appeared. Each object patch for the scene locates
    /// its own target inside the hierarchy.
    pub fn object_appeared(&self, scene: &mut Scene, factory: &dyn PrefabFactory) -> DispatchReport {
        let mut report = DispatchReport::default();
        for action in self.actions() {
            if let PatchAction::Object(patch) = action
                && patch.scene == scene.name()
            {
                report.record(action, patch.apply(scene, factory));
            }
        }
        debug!(scene = scene.name(), ?report, "object patches dispatched");
        report
    }

    /// `fsm` was enabled on its owner in `scene`. Only exact
    /// `(scene, owner, fsm)` matches run.
    pub fn fsm_enabled(&self, scene: &str, fsm: &mut Fsm) -> DispatchReport {
        let mut report = DispatchReport::default();
        for action in self.actions() {
            if let PatchAction::Fsm(patch) = action
                && patch.matches(scene, fsm.owner(), fsm.name())
            {
                report.record(action, patch.apply(fsm));
            }
        }
        if report.matched > 0 {
            debug!(scene, object = fsm.owner(), fsm = fsm.name(), ?report, "fsm patches dispatched");
        }
        report
    }

    /// `entity` died in `scene`. Runs ahead of the host's own death handling.
    pub fn entity_died(&self, scene: &mut Scene, entity: ObjectId) -> DispatchReport {
        let mut report = DispatchReport::default();
        for action in self.actions() {
            if let PatchAction::Death(patch) = action
                && patch.scene == scene.name()
            {
                report.record(action, patch.apply(scene, entity));
            }
        }
        debug!(scene = scene.name(), ?report, "death patches dispatched");
        report
    }

    /// Enable every FSM of every object in `scene`, in hierarchy order.
    pub fn enable_scene_fsms(&self, scene: &mut Scene) -> DispatchReport {
        let mut report = DispatchReport::default();
        let scene_name = scene.name().to_string();
        for id in scene.ids() {
            let Some(object) = scene.get_mut(id) else {
                continue;
            };
            for fsm in &mut object.fsms {
                report += self.fsm_enabled(&scene_name, fsm);
            }
        }
        report
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::death_edit::DeathEdit;
    use crate::fsm_edit::{CustomFsmEdit, FsmEdit};
    use crate::object_edit::ObjectEdit;
    use crate::scene::SceneObject;
    use crate::test_utils::{EmptyFactory, TestFactory};

    fn counting(label: &str, calls: &Rc<Cell<u32>>) -> FsmEdit {
        let calls = Rc::clone(calls);
        FsmEdit::Custom(CustomFsmEdit::new(label, move |_| {
            calls.set(calls.get() + 1);
            Ok(())
        }))
    }

    fn failing(label: &str) -> FsmEdit {
        FsmEdit::Custom(CustomFsmEdit::new(label, |_| {
            Err(PatchError::Custom("routine raised".into()))
        }))
    }

    fn loaded(actions: Vec<PatchAction>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.load(PatchRegistry::new(actions));
        dispatcher
    }

    #[test]
    fn idle_dispatcher_matches_nothing() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.is_loaded());
        let mut fsm = Fsm::new("Y", "Z");
        assert_eq!(dispatcher.fsm_enabled("X", &mut fsm), DispatchReport::default());
    }

    #[test]
    fn fsm_dispatch_requires_exact_triple() {
        let hit = Rc::new(Cell::new(0));
        let miss = Rc::new(Cell::new(0));
        let dispatcher = loaded(vec![
            PatchAction::fsm("X", "Y", "Z", counting("hit", &hit)),
            PatchAction::fsm("X", "W", "Z", counting("miss", &miss)),
        ]);

        let mut fsm = Fsm::new("Y", "Z");
        let report = dispatcher.fsm_enabled("X", &mut fsm);
        assert_eq!(report.matched, 1);
        assert_eq!((hit.get(), miss.get()), (1, 0));

        let mut other = Fsm::new("Y", "Z");
        assert_eq!(dispatcher.fsm_enabled("X2", &mut other).matched, 0);
    }

    #[test]
    fn failing_patch_does_not_stop_the_batch() {
        let after = Rc::new(Cell::new(0));
        let dispatcher = loaded(vec![
            PatchAction::fsm("X", "Y", "Z", failing("boom")),
            PatchAction::fsm("X", "Y", "Z", counting("after", &after)),
        ]);
        let mut fsm = Fsm::new("Y", "Z");
        let report = dispatcher.fsm_enabled("X", &mut fsm);
        assert_eq!(
            report,
            DispatchReport {
                matched: 2,
                applied: 1,
                failed: 1,
            }
        );
        assert_eq!(after.get(), 1);
    }

    #[test]
    fn object_patch_failure_is_isolated() {
        let dispatcher = loaded(vec![
            PatchAction::object(
                "Town",
                ObjectEdit::CreateNewShiny {
                    name: "New Shiny 0".into(),
                    x: 1.0,
                    y: 2.0,
                },
            ),
            PatchAction::object(
                "Town",
                ObjectEdit::ReplaceObjectWithShiny {
                    object: "Missing".into(),
                    shiny_name: "Randomizer Shiny 0".into(),
                },
            ),
            PatchAction::object(
                "Elsewhere",
                ObjectEdit::CreateNewShiny {
                    name: "New Shiny 1".into(),
                    x: 0.0,
                    y: 0.0,
                },
            ),
        ]);

        let mut scene = Scene::new("Town");
        let report = dispatcher.object_appeared(&mut scene, &TestFactory);
        assert_eq!((report.matched, report.applied, report.failed), (2, 1, 1));
        assert!(scene.find("New Shiny 0").is_some());
        assert!(scene.find("New Shiny 1").is_none());

        let mut bare = Scene::new("Town");
        let report = dispatcher.object_appeared(&mut bare, &EmptyFactory);
        assert_eq!(report.applied, 0);
    }

    #[test]
    fn death_patches_filter_by_scene() {
        let dispatcher = loaded(vec![PatchAction::death(
            "Arena",
            DeathEdit::ActivateEnemyShiny {
                enemy: "Boss".into(),
                parent: "Parent".into(),
            },
        )]);
        let mut scene = Scene::new("Arena");
        let boss = scene.add(SceneObject::new("Boss"));
        let parent = scene.add(SceneObject::new("Parent").inactive());
        let report = dispatcher.entity_died(&mut scene, boss);
        assert_eq!(report.applied, 1);
        assert!(scene.get(parent).unwrap().active);

        let mut elsewhere = Scene::new("Other");
        let boss = elsewhere.add(SceneObject::new("Boss"));
        assert_eq!(dispatcher.entity_died(&mut elsewhere, boss).matched, 0);
    }

    #[test]
    fn load_replaces_registry() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let mut dispatcher = loaded(vec![PatchAction::fsm("X", "Y", "Z", counting("a", &first))]);
        let previous = dispatcher.load(PatchRegistry::new(vec![PatchAction::fsm(
            "X",
            "Y",
            "Z",
            counting("b", &second),
        )]));
        assert_eq!(previous.map(|r| r.len()), Some(1));

        let mut fsm = Fsm::new("Y", "Z");
        dispatcher.fsm_enabled("X", &mut fsm);
        assert_eq!((first.get(), second.get()), (0, 1));
    }

    #[test]
    fn scene_fsms_are_enabled_in_order() {
        let calls = Rc::new(Cell::new(0));
        let dispatcher = loaded(vec![PatchAction::fsm("Town", "Child", "Control", counting("c", &calls))]);
        let mut scene = Scene::new("Town");
        let root = scene.add(SceneObject::new("Root").with_fsm(Fsm::new("", "Control")));
        scene
            .add_child(root, SceneObject::new("Child").with_fsm(Fsm::new("", "Control")))
            .unwrap();
        let report = dispatcher.enable_scene_fsms(&mut scene);
        assert_eq!(report.applied, 1);
        assert_eq!(calls.get(), 1);
    }
}
