//! Edits applied to a scene when its objects appear.
//!
//! The dispatcher only filters these by scene name; each edit finds its own
//! target through the object hierarchy.

use glam::Vec3;
use serde::Serialize;

use crate::content::{PlacedContent, ShopEntry, shiny, write_shiny_content};
use crate::catalog::GiveAction;
use crate::fsm::Fsm;
use crate::id::ObjectId;
use crate::patch::PatchError;
use crate::prefab::{Container, GeoRockSubtype, Prefab, PrefabFactory};
use crate::scene::{PersistentBool, Scene, SceneObject};
use crate::step::{ActivationCondition, RandoStep, kinds};

/// FSM the deferred-activation check lives in on an intermediary parent.
pub const ACTIVATION_FSM: &str = "Rando Activation";
const ACTIVATION_STATE: &str = "Check";

const BOTTLE_CONTROL: &str = "Bottle Control";
const GEO_ROCK: &str = "Geo Rock";
const SOUL_TOTEM: &str = "soul_totem";
const CHEST_SPAWN_ITEMS: &str = "Spawn Items";

/// Locations whose replacement must not inherit the original's parent.
const UNPARENTED_LOCATIONS: &[&str] = &["Shade_Cloak", "Grub-Watcher's_Spire"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ObjectEdit {
    CreateNewShiny {
        name: String,
        x: f32,
        y: f32,
    },
    /// A shiny under an intermediary parent, revealed once `activation` holds.
    /// `content`, when set, is written into the shiny as it is created.
    CreateInactiveShiny {
        parent: String,
        shiny_name: String,
        x: f32,
        y: f32,
        activation: ActivationCondition,
        content: Option<PlacedContent>,
    },
    ReplaceObjectWithShiny {
        object: String,
        shiny_name: String,
    },
    CreateContainer {
        container: Container,
        name: String,
        x: f32,
        y: f32,
        item: String,
        location: String,
        unrandomized: bool,
    },
    ReplaceWithContainer {
        container: Container,
        object: String,
        elevation: f32,
        name: String,
        item: String,
        location: String,
        unrandomized: bool,
    },
    AddShinyToChest {
        chest: String,
        chest_fsm: String,
        shiny_name: String,
    },
    ChangeShopContents {
        object: String,
        entries: Vec<ShopEntry>,
    },
}

impl ObjectEdit {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectEdit::CreateNewShiny { .. } => "CreateNewShiny",
            ObjectEdit::CreateInactiveShiny { .. } => "CreateInactiveShiny",
            ObjectEdit::ReplaceObjectWithShiny { .. } => "ReplaceObjectWithShiny",
            ObjectEdit::CreateContainer { .. } => "CreateContainer",
            ObjectEdit::ReplaceWithContainer { .. } => "ReplaceWithContainer",
            ObjectEdit::AddShinyToChest { .. } => "AddShinyToChest",
            ObjectEdit::ChangeShopContents { .. } => "ChangeShopContents",
        }
    }

    /// Objects the edit created are destroyed again if it fails, so an
    /// error leaves the scene as it was.
    pub fn apply(
        &self,
        scene_name: &str,
        scene: &mut Scene,
        factory: &dyn PrefabFactory,
    ) -> Result<(), PatchError> {
        let mut created = Vec::new();
        let result = self.apply_tracked(scene_name, scene, factory, &mut created);
        if result.is_err() {
            for id in created.into_iter().rev() {
                // A created parent may already have taken its children with it.
                let _ = scene.destroy(id);
            }
        }
        result
    }

    fn apply_tracked(
        &self,
        scene_name: &str,
        scene: &mut Scene,
        factory: &dyn PrefabFactory,
        created: &mut Vec<ObjectId>,
    ) -> Result<(), PatchError> {
        match self {
            ObjectEdit::CreateNewShiny { name, x, y } => {
                let id = spawn(scene, factory, created, Prefab::Shiny, name)?;
                let obj = scene.object_mut(id)?;
                obj.position = Vec3::new(*x, *y, obj.position.z);
                obj.active = true;
                Ok(())
            }
            ObjectEdit::CreateInactiveShiny {
                parent,
                shiny_name,
                x,
                y,
                activation,
                content,
            } => {
                let parent_id = match scene.find(parent) {
                    Some(id) => id,
                    None => {
                        let id = scene.add(SceneObject::new(parent).at(Vec3::new(*x, *y, 0.0)));
                        created.push(id);
                        id
                    }
                };
                let id = spawn(scene, factory, created, Prefab::Shiny, shiny_name)?;
                scene.set_parent(id, Some(parent_id))?;
                let obj = scene.object_mut(id)?;
                obj.position = Vec3::new(*x, *y, obj.position.z);
                obj.active = false;
                if let Some(placed) = content {
                    write_shiny_content(
                        require_fsm(obj, shiny::FSM)?,
                        &placed.item,
                        &placed.location,
                        &placed.content,
                    )?;
                }

                let parent_obj = scene.object_mut(parent_id)?;
                if parent_obj.fsm(ACTIVATION_FSM).is_none() {
                    let mut fsm = Fsm::new(parent, ACTIVATION_FSM);
                    fsm.add_state(ACTIVATION_STATE)?;
                    parent_obj.add_fsm(fsm);
                }
                require_fsm(parent_obj, ACTIVATION_FSM)?
                    .state_mut(ACTIVATION_STATE)?
                    .add_step(RandoStep::ActivateWhen {
                        condition: activation.clone(),
                        child: shiny_name.clone(),
                    });
                Ok(())
            }
            ObjectEdit::ReplaceObjectWithShiny { object, shiny_name } => {
                let original = scene.require_path(object)?;
                let (parent, position, active) = {
                    let obj = scene.object(original)?;
                    (obj.parent(), obj.position, obj.active)
                };
                let id = spawn(scene, factory, created, Prefab::Shiny, shiny_name)?;
                if parent.is_some() {
                    scene.set_parent(id, parent)?;
                }
                let obj = scene.object_mut(id)?;
                obj.position = position;
                obj.active = active;
                scene.destroy(original)?;
                Ok(())
            }
            ObjectEdit::CreateContainer {
                container,
                name,
                x,
                y,
                item,
                location,
                unrandomized,
            } => {
                let id = spawn(scene, factory, created, container.prefab(), name)?;
                let obj = scene.object_mut(id)?;
                obj.position = Vec3::new(*x, *y, obj.position.z);
                obj.active = true;
                configure_container(obj, *container, scene_name, item, location, *unrandomized)
            }
            ObjectEdit::ReplaceWithContainer {
                container,
                object,
                elevation,
                name,
                item,
                location,
                unrandomized,
            } => {
                let original = scene.require_path(object)?;
                let (parent, position, active) = {
                    let obj = scene.object(original)?;
                    (obj.parent(), obj.position, obj.active)
                };
                let id = spawn(scene, factory, created, container.prefab(), name)?;
                if parent.is_some() && !UNPARENTED_LOCATIONS.contains(&location.as_str()) {
                    scene.set_parent(id, parent)?;
                }
                let obj = scene.object_mut(id)?;
                obj.position = position + Vec3::Y * (container.elevation() - elevation);
                if let Container::GeoRock {
                    subtype: GeoRockSubtype::Outskirts420,
                    ..
                } = container
                {
                    obj.scale.x *= 0.5;
                    obj.scale.y *= 0.5;
                }
                obj.active = active;
                configure_container(obj, *container, scene_name, item, location, *unrandomized)?;
                scene.destroy(original)?;
                Ok(())
            }
            ObjectEdit::AddShinyToChest {
                chest,
                chest_fsm,
                shiny_name,
            } => {
                let chest_id = scene.require_path(chest)?;
                let position = scene.object(chest_id)?.position;
                let id = spawn(scene, factory, created, Prefab::Shiny, shiny_name)?;
                scene.set_parent(id, Some(chest_id))?;
                let obj = scene.object_mut(id)?;
                obj.position = position;
                obj.active = false;

                let spawn_items = require_fsm(scene.object_mut(chest_id)?, chest_fsm)?
                    .state_mut(CHEST_SPAWN_ITEMS)?;
                spawn_items.remove_steps_of_kind(kinds::FLING_OBJECTS);
                spawn_items.add_step(RandoStep::ActivateObject {
                    path: shiny_name.clone(),
                });
                Ok(())
            }
            ObjectEdit::ChangeShopContents { object, entries } => {
                let id = scene.require_path(object)?;
                let stock = scene.object_mut(id)?.shop_stock.get_or_insert_with(Vec::new);
                for entry in entries {
                    if !stock.iter().any(|e| e.bool_name == entry.bool_name) {
                        stock.push(entry.clone());
                    }
                }
                Ok(())
            }
        }
    }
}

fn spawn(
    scene: &mut Scene,
    factory: &dyn PrefabFactory,
    created: &mut Vec<ObjectId>,
    prefab: Prefab,
    name: &str,
) -> Result<ObjectId, PatchError> {
    let id = factory.instantiate(scene, prefab)?;
    created.push(id);
    scene.object_mut(id)?.rename(name);
    Ok(id)
}

fn require_fsm<'a>(obj: &'a mut SceneObject, fsm: &str) -> Result<&'a mut Fsm, PatchError> {
    let object = obj.name().to_string();
    obj.fsm_mut(fsm).ok_or(PatchError::MissingFsm {
        object,
        fsm: fsm.to_string(),
    })
}

/// Tie a freshly placed container to its location: persistence id, a check
/// that skips it once collected, and the grant on break.
fn configure_container(
    obj: &mut SceneObject,
    container: Container,
    scene_name: &str,
    item: &str,
    location: &str,
    unrandomized: bool,
) -> Result<(), PatchError> {
    let suffix = match container {
        Container::GrubJar | Container::MimicBottle => "bottle",
        Container::GeoRock { .. } => "rock",
        Container::SoulTotem { .. } => "totem",
    };
    obj.persistent = Some(PersistentBool {
        scene: scene_name.to_string(),
        id: format!("{location} {suffix}"),
    });

    match container {
        Container::GrubJar | Container::MimicBottle => {
            if unrandomized {
                return Ok(());
            }
            let fsm = require_fsm(obj, BOTTLE_CONTROL)?;
            let init = fsm.state_mut(shiny::INIT)?;
            init.remove_steps_of_kind(kinds::BOOL_TEST);
            init.add_first_step(RandoStep::check_found(location, "ACTIVATE"));
            fsm.state_mut("Shatter")?
                .add_first_step(RandoStep::give(GiveAction::None, item, location));
        }
        Container::GeoRock { geo, .. } => {
            let fsm = require_fsm(obj, GEO_ROCK)?;
            fsm.variables.get_or_create_int("Geo").value = geo;
            fsm.state_mut("Initiate")?
                .add_first_step(RandoStep::check_found(location, "BROKEN"));
            let broken = fsm.state_mut("Destroy")?;
            broken.remove_steps_of_kind(kinds::FLING_OBJECTS);
            broken.add_first_step(RandoStep::give(GiveAction::None, item, location));
            broken.add_step(RandoStep::SpawnGeo { amount: geo });
        }
        Container::SoulTotem { .. } => {
            let fsm = require_fsm(obj, SOUL_TOTEM)?;
            fsm.state_mut(shiny::INIT)?
                .add_first_step(RandoStep::check_found(location, "DEPLETED"));
            fsm.state_mut("Hit")?
                .add_first_step(RandoStep::give(GiveAction::None, item, location));
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
