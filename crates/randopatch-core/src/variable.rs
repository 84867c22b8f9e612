//! Typed variable slots owned by an FSM.
//!
//! Each family is an append-only list of named slots. `get_or_create` never
//! fails: it returns the existing slot or appends a default-valued one.
//! Slots are never removed, so a slot index stays valid for the FSM's life.

use glam::{Quat, Vec2, Vec3, Vec4};
use serde::Serialize;

/// Axis-aligned rectangle value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A named, typed slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable<T> {
    pub name: String,
    pub value: T,
}

/// Append-only collection of slots of one type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableFamily<T> {
    slots: Vec<Variable<T>>,
}

impl<T> Default for VariableFamily<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T: Default> VariableFamily<T> {
    /// Index of the slot named `name`, creating it with `T::default()` when absent.
    pub fn get_or_create_index(&mut self, name: &str) -> usize {
        match self.index_of(name) {
            Some(index) => index,
            None => {
                self.slots.push(Variable {
                    name: name.to_string(),
                    value: T::default(),
                });
                self.slots.len() - 1
            }
        }
    }

    pub fn get_or_create(&mut self, name: &str) -> &mut Variable<T> {
        let index = self.get_or_create_index(name);
        &mut self.slots[index]
    }
}

impl<T> VariableFamily<T> {
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|v| v.name == name)
    }

    pub fn find(&self, name: &str) -> Option<&Variable<T>> {
        self.slots.iter().find(|v| v.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Variable<T>> {
        self.slots.iter_mut().find(|v| v.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&Variable<T>> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable<T>> {
        self.slots.iter()
    }
}

/// Every typed slot family of one FSM.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Variables {
    pub floats: VariableFamily<f32>,
    pub ints: VariableFamily<i32>,
    pub bools: VariableFamily<bool>,
    pub strings: VariableFamily<String>,
    pub vector2s: VariableFamily<Vec2>,
    pub vector3s: VariableFamily<Vec3>,
    pub colors: VariableFamily<Vec4>,
    pub rects: VariableFamily<Rect>,
    pub quaternions: VariableFamily<Quat>,
    /// Object references, stored as hierarchy paths. `None` is an unset reference.
    pub objects: VariableFamily<Option<String>>,
}

macro_rules! family_accessors {
    ($($field:ident: $ty:ty => $get_or_create:ident, $find:ident;)*) => {
        impl Variables {
            $(
                pub fn $get_or_create(&mut self, name: &str) -> &mut Variable<$ty> {
                    self.$field.get_or_create(name)
                }

                pub fn $find(&self, name: &str) -> Option<&Variable<$ty>> {
                    self.$field.find(name)
                }
            )*
        }
    };
}

family_accessors! {
    floats: f32 => get_or_create_float, find_float;
    ints: i32 => get_or_create_int, find_int;
    bools: bool => get_or_create_bool, find_bool;
    strings: String => get_or_create_string, find_string;
    vector2s: Vec2 => get_or_create_vector2, find_vector2;
    vector3s: Vec3 => get_or_create_vector3, find_vector3;
    colors: Vec4 => get_or_create_color, find_color;
    rects: Rect => get_or_create_rect, find_rect;
    quaternions: Quat => get_or_create_quaternion, find_quaternion;
    objects: Option<String> => get_or_create_object, find_object;
}

// ===========================================================================
// Tests
// ===========================================================================
