//! Edits run when an entity dies, before the host's own death handling.

use serde::Serialize;

use crate::id::ObjectId;
use crate::patch::PatchError;
use crate::scene::{GeoDrops, Scene, SceneError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DeathEdit {
    /// Move the shiny's parent to where `enemy` fell and reveal it.
    ActivateEnemyShiny { enemy: String, parent: String },
    /// As `ActivateEnemyShiny`, and the boss no longer drops its geo.
    BossGeoReward { enemy: String, parent: String },
}

impl DeathEdit {
    pub fn name(&self) -> &'static str {
        match self {
            DeathEdit::ActivateEnemyShiny { .. } => "ActivateEnemyShiny",
            DeathEdit::BossGeoReward { .. } => "BossGeoReward",
        }
    }

    /// Deaths of other entities in the scene are ignored.
    pub fn apply(&self, scene: &mut Scene, entity: ObjectId) -> Result<(), PatchError> {
        let (enemy, parent, zero_geo) = match self {
            DeathEdit::ActivateEnemyShiny { enemy, parent } => (enemy, parent, false),
            DeathEdit::BossGeoReward { enemy, parent } => (enemy, parent, true),
        };

        let dead = scene.object(entity)?;
        if dead.name() != enemy.as_str() {
            return Ok(());
        }
        let position = dead.position;
        let parent_id = scene
            .find(parent)
            .ok_or_else(|| SceneError::ObjectNotFound(parent.clone()))?;

        if zero_geo {
            scene.object_mut(entity)?.geo_drops = Some(GeoDrops::default());
        }
        let children = {
            let obj = scene.object_mut(parent_id)?;
            obj.position.x = position.x;
            obj.position.y = position.y;
            obj.active = true;
            obj.children().to_vec()
        };
        for child in children {
            scene.object_mut(child)?.active = true;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneObject;
    use glam::Vec3;

    fn arena() -> (Scene, ObjectId, ObjectId) {
        let mut scene = Scene::new("Crossroads_04");
        let mut boss = SceneObject::new("Giant Fly").at(Vec3::new(40.0, 12.0, 0.0));
        boss.geo_drops = Some(GeoDrops {
            small: 0,
            medium: 10,
            large: 2,
        });
        let boss = scene.add(boss);
        let parent = scene.add(SceneObject::new("Randomizer Shiny 0 Parent"));
        let shiny = scene
            .add_child(parent, SceneObject::new("Randomizer Shiny 0").inactive())
            .unwrap();
        (scene, boss, shiny)
    }

    #[test]
    fn boss_reward_zeroes_geo_and_reveals_shiny() {
        let (mut scene, boss, shiny) = arena();
        DeathEdit::BossGeoReward {
            enemy: "Giant Fly".into(),
            parent: "Randomizer Shiny 0 Parent".into(),
        }
        .apply(&mut scene, boss)
        .unwrap();
        assert_eq!(scene.get(boss).unwrap().geo_drops, Some(GeoDrops::default()));
        assert!(scene.is_active_in_hierarchy(shiny));
        let parent = scene.find("Randomizer Shiny 0 Parent").unwrap();
        assert_eq!(scene.get(parent).unwrap().position.x, 40.0);
    }

    #[test]
    fn other_deaths_are_ignored() {
        let (mut scene, _, shiny) = arena();
        let fly = scene.add(SceneObject::new("Fly"));
        DeathEdit::ActivateEnemyShiny {
            enemy: "Giant Fly".into(),
            parent: "Randomizer Shiny 0 Parent".into(),
        }
        .apply(&mut scene, fly)
        .unwrap();
        assert!(!scene.is_active_in_hierarchy(shiny));
    }

    #[test]
    fn enemy_shiny_keeps_geo_drops() {
        let (mut scene, boss, shiny) = arena();
        DeathEdit::ActivateEnemyShiny {
            enemy: "Giant Fly".into(),
            parent: "Randomizer Shiny 0 Parent".into(),
        }
        .apply(&mut scene, boss)
        .unwrap();
        assert_eq!(scene.get(boss).unwrap().geo_drops.map(|g| g.medium), Some(10));
        assert!(scene.is_active_in_hierarchy(shiny));
    }

    #[test]
    fn missing_parent_is_an_error() {
        let mut scene = Scene::new("Crossroads_04");
        let boss = scene.add(SceneObject::new("Giant Fly"));
        let err = DeathEdit::BossGeoReward {
            enemy: "Giant Fly".into(),
            parent: "Nope".into(),
        }
        .apply(&mut scene, boss)
        .unwrap_err();
        assert!(matches!(err, PatchError::Scene(SceneError::ObjectNotFound(_))));
    }

    #[test]
    fn missing_parent_leaves_boss_geo() {
        let (mut scene, boss, _) = arena();
        let result = DeathEdit::BossGeoReward {
            enemy: "Giant Fly".into(),
            parent: "Missing Parent".into(),
        }
        .apply(&mut scene, boss);
        assert!(result.is_err());
        assert_eq!(
            scene.get(boss).unwrap().geo_drops,
            Some(GeoDrops {
                small: 0,
                medium: 10,
                large: 2,
            })
        );
    }
}
