//! Host scene model: a hierarchy of named objects carrying FSMs.
//!
//! Objects live in a generation-checked arena. Name lookups search the
//! hierarchy depth-first in insertion order, inactive objects included, and
//! `A\B\C` paths descend through children.

use glam::Vec3;
use serde::Serialize;
use slotmap::SlotMap;

use crate::content::ShopEntry;
use crate::fsm::Fsm;
use crate::id::ObjectId;

/// Separator between names in an object path.
pub const PATH_SEPARATOR: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),
    #[error("stale object handle: {0:?}")]
    StaleHandle(ObjectId),
}

/// Scene-persistent flag record attached to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistentBool {
    pub scene: String,
    pub id: String,
}

/// Geo an enemy drops on death.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeoDrops {
    pub small: i32,
    pub medium: i32,
    pub large: i32,
}

// ---------------------------------------------------------------------------
// SceneObject
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SceneObject {
    name: String,
    pub active: bool,
    pub position: Vec3,
    pub scale: Vec3,
    pub fsms: Vec<Fsm>,
    pub persistent: Option<PersistentBool>,
    pub geo_drops: Option<GeoDrops>,
    pub shop_stock: Option<Vec<ShopEntry>>,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
}

impl SceneObject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: true,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            fsms: Vec::new(),
            persistent: None,
            geo_drops: None,
            shop_stock: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_fsm(mut self, mut fsm: Fsm) -> Self {
        fsm.set_owner(&self.name);
        self.fsms.push(fsm);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the object; attached FSMs follow.
    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        for fsm in &mut self.fsms {
            fsm.set_owner(name);
        }
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn fsm(&self, name: &str) -> Option<&Fsm> {
        self.fsms.iter().find(|f| f.name() == name)
    }

    pub fn fsm_mut(&mut self, name: &str) -> Option<&mut Fsm> {
        self.fsms.iter_mut().find(|f| f.name() == name)
    }

    pub fn add_fsm(&mut self, mut fsm: Fsm) {
        fsm.set_owner(&self.name);
        self.fsms.push(fsm);
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Scene {
    name: String,
    objects: SlotMap<ObjectId, SceneObject>,
    roots: Vec<ObjectId>,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            objects: SlotMap::with_key(),
            roots: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut SceneObject, SceneError> {
        self.objects.get_mut(id).ok_or(SceneError::StaleHandle(id))
    }

    pub fn object(&self, id: ObjectId) -> Result<&SceneObject, SceneError> {
        self.objects.get(id).ok_or(SceneError::StaleHandle(id))
    }

    /// Ids of every live object, roots first then depth-first.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut out = Vec::with_capacity(self.objects.len());
        let mut stack: Vec<ObjectId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(obj) = self.objects.get(id) {
                out.push(id);
                stack.extend(obj.children.iter().rev().copied());
            }
        }
        out
    }

    // -- Insertion ----------------------------------------------------------

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = self.objects.insert(object);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: ObjectId, mut object: SceneObject) -> Result<ObjectId, SceneError> {
        if !self.objects.contains_key(parent) {
            return Err(SceneError::StaleHandle(parent));
        }
        object.parent = Some(parent);
        let id = self.objects.insert(object);
        self.objects[parent].children.push(id);
        Ok(id)
    }

    /// Move `child` under `parent` (`None` makes it a root).
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> Result<(), SceneError> {
        if !self.objects.contains_key(child) {
            return Err(SceneError::StaleHandle(child));
        }
        if let Some(p) = parent
            && !self.objects.contains_key(p)
        {
            return Err(SceneError::StaleHandle(p));
        }
        self.detach(child);
        self.objects[child].parent = parent;
        match parent {
            Some(p) => self.objects[p].children.push(child),
            None => self.roots.push(child),
        }
        Ok(())
    }

    fn detach(&mut self, id: ObjectId) {
        match self.objects[id].parent {
            Some(p) => {
                if let Some(parent) = self.objects.get_mut(p) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }

    /// Remove an object and all of its descendants.
    pub fn destroy(&mut self, id: ObjectId) -> Result<(), SceneError> {
        if !self.objects.contains_key(id) {
            return Err(SceneError::StaleHandle(id));
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(obj) = self.objects.remove(next) {
                stack.extend(obj.children);
            }
        }
        Ok(())
    }

    // -- Lookup -------------------------------------------------------------

    /// First object named `name` anywhere in the scene.
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.ids()
            .into_iter()
            .find(|id| self.objects[*id].name == name)
    }

    /// First descendant of `parent` named `name`.
    pub fn find_in_children(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        let mut stack: Vec<ObjectId> = self
            .objects
            .get(parent)?
            .children
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            let obj = self.objects.get(id)?;
            if obj.name == name {
                return Some(id);
            }
            stack.extend(obj.children.iter().rev().copied());
        }
        None
    }

    /// Resolve an `A\B\C` path: `A` anywhere in the scene, each later
    /// segment among the previous object's descendants.
    pub fn find_path(&self, path: &str) -> Option<ObjectId> {
        let mut segments = path.split(PATH_SEPARATOR);
        let mut current = self.find(segments.next()?)?;
        for segment in segments {
            current = self.find_in_children(current, segment)?;
        }
        Some(current)
    }

    /// Like [`find_path`](Self::find_path), but absent paths are an error.
    pub fn require_path(&self, path: &str) -> Result<ObjectId, SceneError> {
        self.find_path(path)
            .ok_or_else(|| SceneError::ObjectNotFound(path.to_string()))
    }

    /// Full `A\B\C` path of an object.
    pub fn path_of(&self, id: ObjectId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            let obj = self.objects.get(next)?;
            names.push(obj.name.as_str());
            current = obj.parent;
        }
        names.reverse();
        let separator = PATH_SEPARATOR.to_string();
        Some(names.join(separator.as_str()))
    }

    /// Active, with every ancestor active too.
    pub fn is_active_in_hierarchy(&self, id: ObjectId) -> bool {
        let mut current = Some(id);
        while let Some(next) = current {
            match self.objects.get(next) {
                Some(obj) if obj.active => current = obj.parent,
                _ => return false,
            }
        }
        true
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> (Scene, ObjectId, ObjectId, ObjectId) {
        let mut scene = Scene::new("Crossroads_38");
        let root = scene.add(SceneObject::new("Grub Bottle"));
        let child = scene.add_child(root, SceneObject::new("Grub")).unwrap();
        let leaf = scene.add_child(child, SceneObject::new("Grub Mimic 1")).unwrap();
        (scene, root, child, leaf)
    }

    #[test]
    fn find_searches_depth_first() {
        let (scene, root, _, leaf) = scene();
        assert_eq!(scene.find("Grub Bottle"), Some(root));
        assert_eq!(scene.find("Grub Mimic 1"), Some(leaf));
        assert_eq!(scene.find("Nope"), None);
    }

    #[test]
    fn find_path_descends() {
        let (scene, _, child, leaf) = scene();
        assert_eq!(scene.find_path("Grub Bottle\\Grub"), Some(child));
        assert_eq!(scene.find_path("Grub Bottle\\Grub Mimic 1"), Some(leaf));
        assert_eq!(scene.find_path("Grub\\Grub Bottle"), None);
        assert!(scene.require_path("Grub Bottle\\Nope").is_err());
    }

    #[test]
    fn path_of_round_trips_through_find_path() {
        let (scene, _, _, leaf) = scene();
        let path = scene.path_of(leaf).unwrap();
        assert_eq!(path, "Grub Bottle\\Grub\\Grub Mimic 1");
        assert_eq!(scene.find_path(&path), Some(leaf));
    }

    #[test]
    fn destroy_removes_descendants() {
        let (mut scene, _, child, leaf) = scene();
        scene.destroy(child).unwrap();
        assert_eq!(scene.object_count(), 1);
        assert!(scene.get(leaf).is_none());
        assert!(scene.destroy(child).is_err());
    }

    #[test]
    fn set_parent_moves_between_roots_and_children() {
        let (mut scene, root, child, _) = scene();
        scene.set_parent(child, None).unwrap();
        assert!(scene.get(root).unwrap().children().is_empty());
        assert_eq!(scene.roots().len(), 2);
        scene.set_parent(child, Some(root)).unwrap();
        assert_eq!(scene.get(child).unwrap().parent(), Some(root));
        assert_eq!(scene.roots().len(), 1);
    }

    #[test]
    fn inactive_ancestor_hides_descendants() {
        let (mut scene, root, _, leaf) = scene();
        assert!(scene.is_active_in_hierarchy(leaf));
        scene.get_mut(root).unwrap().active = false;
        assert!(!scene.is_active_in_hierarchy(leaf));
    }

    #[test]
    fn rename_updates_fsm_owner() {
        let mut obj = SceneObject::new("Shiny Item").with_fsm(Fsm::new("", "Shiny Control"));
        assert_eq!(obj.fsm("Shiny Control").unwrap().owner(), "Shiny Item");
        obj.rename("Randomizer Shiny 1");
        assert_eq!(obj.fsm("Shiny Control").unwrap().owner(), "Randomizer Shiny 1");
    }
}
