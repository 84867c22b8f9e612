//! Mutable FSM graph model.
//!
//! States live in a generation-checked [`SlotMap`]. A [`Transition`] stores its
//! target by name and caches the target's [`StateId`]; the cache is only a
//! hint. Every traversal goes through [`Fsm::resolve`], which checks the cached
//! key is still live and still bound to the recorded name before falling back
//! to a name lookup. A transition can therefore never reach a state that is
//! not currently a member of the FSM, even after `remove_state`.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use slotmap::SlotMap;

use crate::id::StateId;
use crate::step::Step;
use crate::variable::Variables;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from structural FSM edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
    #[error("state not found: {0}")]
    StateNotFound(String),
    #[error("no transition for event {event} in state {state}")]
    TransitionNotFound { state: String, event: String },
    #[error("step index {index} out of range for state {state} ({len} steps)")]
    StepOutOfRange {
        state: String,
        index: usize,
        len: usize,
    },
    #[error("duplicate state name: {0}")]
    DuplicateName(String),
}

// ---------------------------------------------------------------------------
// Transitions and events
// ---------------------------------------------------------------------------

/// A named event known to an FSM.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FsmEvent(pub String);

impl FsmEvent {
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// An event-labelled edge to a target state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub event: String,
    pub target: String,
    #[serde(skip)]
    cached: Option<StateId>,
}

impl Transition {
    /// The cached target key. May be stale; use [`Fsm::resolve`] to traverse.
    pub fn cached_target(&self) -> Option<StateId> {
        self.cached
    }
}

/// A transition whose target name is not a current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingTransition {
    /// Owning state, or `None` for a global transition.
    pub state: Option<String>,
    pub event: String,
    pub target: String,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A named node holding ordered steps and outgoing transitions.
#[derive(Debug, Clone)]
pub struct State {
    name: String,
    steps: Vec<Box<dyn Step>>,
    transitions: Vec<Transition>,
}

impl State {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// First transition for `event` (first-match semantics).
    pub fn transition(&self, event: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.event == event)
    }

    // -- Steps --------------------------------------------------------------

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, index: usize) -> Option<&dyn Step> {
        self.steps.get(index).map(|s| s.as_ref())
    }

    pub fn step_kinds(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.kind()).collect()
    }

    pub fn add_step(&mut self, step: impl Step + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn add_first_step(&mut self, step: impl Step + 'static) {
        self.steps.insert(0, Box::new(step));
    }

    /// Insert at `index`, shifting later steps back. `index == len` appends.
    pub fn insert_step(&mut self, index: usize, step: impl Step + 'static) -> Result<(), FsmError> {
        if index > self.steps.len() {
            return Err(self.out_of_range(index));
        }
        self.steps.insert(index, Box::new(step));
        Ok(())
    }

    pub fn remove_step(&mut self, index: usize) -> Result<Box<dyn Step>, FsmError> {
        if index >= self.steps.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.steps.remove(index))
    }

    /// Swap the step at `index` for `step`, returning the old one.
    pub fn replace_step(
        &mut self,
        index: usize,
        step: impl Step + 'static,
    ) -> Result<Box<dyn Step>, FsmError> {
        match self.steps.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, Box::new(step))),
            None => Err(self.out_of_range(index)),
        }
    }

    /// Drop the last `count` steps (all of them if there are fewer).
    pub fn remove_last_steps(&mut self, count: usize) {
        let keep = self.steps.len().saturating_sub(count);
        self.steps.truncate(keep);
    }

    pub fn clear_steps(&mut self) {
        self.steps.clear();
    }

    /// Remove every step of `kind`. Returns how many were removed.
    pub fn remove_steps_of_kind(&mut self, kind: &str) -> usize {
        let before = self.steps.len();
        self.steps.retain(|s| s.kind() != kind);
        before - self.steps.len()
    }

    pub fn find_step_of_kind(&self, kind: &str) -> Option<&dyn Step> {
        self.steps
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| s.as_ref())
    }

    pub fn find_steps_of_kind(&self, kind: &str) -> Vec<&dyn Step> {
        self.steps
            .iter()
            .filter(|s| s.kind() == kind)
            .map(|s| s.as_ref())
            .collect()
    }

    pub fn position_of_kind(&self, kind: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.kind() == kind)
    }

    /// First step of concrete type `T`.
    pub fn step_of_type<T: Step + 'static>(&self) -> Option<&T> {
        self.steps.iter().find_map(|s| s.as_any().downcast_ref::<T>())
    }

    pub fn steps_of_type<T: Step + 'static>(&self) -> Vec<&T> {
        self.steps
            .iter()
            .filter_map(|s| s.as_any().downcast_ref::<T>())
            .collect()
    }

    pub fn steps_of_type_mut<T: Step + 'static>(&mut self) -> Vec<&mut T> {
        self.steps
            .iter_mut()
            .filter_map(|s| s.as_any_mut().downcast_mut::<T>())
            .collect()
    }

    fn out_of_range(&self, index: usize) -> FsmError {
        FsmError::StepOutOfRange {
            state: self.name.clone(),
            index,
            len: self.steps.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fsm
// ---------------------------------------------------------------------------

/// One state machine instance, identified by its owning object's name and
/// its own name.
#[derive(Debug, Clone)]
pub struct Fsm {
    owner: String,
    name: String,
    states: SlotMap<StateId, State>,
    /// Insertion order of live states.
    order: Vec<StateId>,
    by_name: HashMap<String, StateId>,
    start: Option<StateId>,
    global_transitions: Vec<Transition>,
    events: BTreeSet<String>,
    pub variables: Variables,
}

impl Fsm {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            states: SlotMap::with_key(),
            order: Vec::new(),
            by_name: HashMap::new(),
            start: None,
            global_transitions: Vec::new(),
            events: BTreeSet::new(),
            variables: Variables::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: &str) {
        self.owner = owner.to_string();
    }

    // -- State queries ------------------------------------------------------

    pub fn state_count(&self) -> usize {
        self.order.len()
    }

    /// Live states in insertion order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.order.iter().filter_map(|id| self.states.get(*id))
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states().map(State::name).collect()
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.by_name.get(name).copied()
    }

    pub fn find_state(&self, name: &str) -> Option<&State> {
        self.state_id(name).and_then(|id| self.states.get(id))
    }

    pub fn find_state_mut(&mut self, name: &str) -> Option<&mut State> {
        let id = self.state_id(name)?;
        self.states.get_mut(id)
    }

    /// Like [`find_state_mut`](Self::find_state_mut), but absent names are an error.
    pub fn state_mut(&mut self, name: &str) -> Result<&mut State, FsmError> {
        self.find_state_mut(name)
            .ok_or_else(|| FsmError::StateNotFound(name.to_string()))
    }

    pub fn state(&self, name: &str) -> Result<&State, FsmError> {
        self.find_state(name)
            .ok_or_else(|| FsmError::StateNotFound(name.to_string()))
    }

    pub fn start_state(&self) -> Option<&State> {
        self.start.and_then(|id| self.states.get(id))
    }

    pub fn set_start_state(&mut self, name: &str) -> Result<(), FsmError> {
        let id = self
            .state_id(name)
            .ok_or_else(|| FsmError::StateNotFound(name.to_string()))?;
        self.start = Some(id);
        Ok(())
    }

    // -- State mutation -----------------------------------------------------

    /// Append a new empty state. The first state added becomes the start state.
    pub fn add_state(&mut self, name: &str) -> Result<&mut State, FsmError> {
        if self.by_name.contains_key(name) {
            return Err(FsmError::DuplicateName(name.to_string()));
        }
        let id = self.insert_state(State::new(name));
        Ok(&mut self.states[id])
    }

    /// Duplicate `from` under the name `to`, re-resolving every copied
    /// transition against the live state collection.
    pub fn copy_state(&mut self, from: &str, to: &str) -> Result<&mut State, FsmError> {
        if self.by_name.contains_key(to) {
            return Err(FsmError::DuplicateName(to.to_string()));
        }
        let mut copy = self.state(from)?.clone();
        copy.name = to.to_string();
        let id = self.insert_state(copy);

        let by_name = &self.by_name;
        for t in self.states[id].transitions.iter_mut() {
            t.cached = by_name.get(&t.target).copied();
        }
        Ok(&mut self.states[id])
    }

    /// Remove a state. Transitions elsewhere that named it are left in place;
    /// they stop resolving and show up in [`dangling_transitions`](Self::dangling_transitions).
    pub fn remove_state(&mut self, name: &str) -> Result<State, FsmError> {
        let id = self
            .by_name
            .remove(name)
            .ok_or_else(|| FsmError::StateNotFound(name.to_string()))?;
        self.order.retain(|o| *o != id);
        if self.start == Some(id) {
            self.start = self.order.first().copied();
        }
        self.states
            .remove(id)
            .ok_or_else(|| FsmError::StateNotFound(name.to_string()))
    }

    fn insert_state(&mut self, state: State) -> StateId {
        let name = state.name.clone();
        let id = self.states.insert(state);
        self.order.push(id);
        self.by_name.insert(name, id);
        if self.start.is_none() {
            self.start = Some(id);
        }
        id
    }

    // -- Transitions --------------------------------------------------------

    pub fn find_transition(&self, state: &str, event: &str) -> Option<&Transition> {
        self.find_state(state)?.transition(event)
    }

    fn make_transition(&mut self, event: &str, target: &str) -> Transition {
        self.events.insert(event.to_string());
        Transition {
            event: event.to_string(),
            target: target.to_string(),
            cached: self.state_id(target),
        }
    }

    /// Append a transition. An existing transition for the same event stays
    /// first and keeps winning; remove it first to replace it.
    pub fn add_transition(
        &mut self,
        state: &str,
        event: &str,
        target: &str,
    ) -> Result<FsmEvent, FsmError> {
        let transition = self.make_transition(event, target);
        self.state_mut(state)?.transitions.push(transition);
        Ok(FsmEvent(event.to_string()))
    }

    pub fn add_global_transition(&mut self, event: &str, target: &str) -> FsmEvent {
        let transition = self.make_transition(event, target);
        self.global_transitions.push(transition);
        FsmEvent(event.to_string())
    }

    pub fn global_transitions(&self) -> &[Transition] {
        &self.global_transitions
    }

    /// Rebind the first transition for `event` to `new_target`.
    pub fn change_transition(
        &mut self,
        state: &str,
        event: &str,
        new_target: &str,
    ) -> Result<(), FsmError> {
        let cached = self.state_id(new_target);
        let owner = self.state_mut(state)?;
        let transition = owner
            .transitions
            .iter_mut()
            .find(|t| t.event == event)
            .ok_or_else(|| FsmError::TransitionNotFound {
                state: state.to_string(),
                event: event.to_string(),
            })?;
        transition.target = new_target.to_string();
        transition.cached = cached;
        Ok(())
    }

    /// Remove the first transition for `event`.
    pub fn remove_transition(&mut self, state: &str, event: &str) -> Result<Transition, FsmError> {
        let owner = self.state_mut(state)?;
        let index = owner
            .transitions
            .iter()
            .position(|t| t.event == event)
            .ok_or_else(|| FsmError::TransitionNotFound {
                state: state.to_string(),
                event: event.to_string(),
            })?;
        Ok(owner.transitions.remove(index))
    }

    /// Remove every transition of `state` that targets `target`.
    pub fn remove_transitions_to(&mut self, state: &str, target: &str) -> Result<usize, FsmError> {
        let owner = self.state_mut(state)?;
        let before = owner.transitions.len();
        owner.transitions.retain(|t| t.target != target);
        Ok(before - owner.transitions.len())
    }

    pub fn clear_transitions(&mut self, state: &str) -> Result<(), FsmError> {
        self.state_mut(state)?.transitions.clear();
        Ok(())
    }

    /// Every event name any transition has been created for.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    // -- Traversal ----------------------------------------------------------

    /// The live state a transition leads to, if any.
    pub fn resolve(&self, transition: &Transition) -> Option<&State> {
        if let Some(id) = transition.cached
            && let Some(state) = self.states.get(id)
            && state.name == transition.target
        {
            return Some(state);
        }
        self.find_state(&transition.target)
    }

    /// Where `event` leads from `from`: the state's first matching transition,
    /// then the first matching global transition.
    pub fn next_state(&self, from: &str, event: &str) -> Option<&State> {
        let transition = self
            .find_transition(from, event)
            .or_else(|| self.global_transitions.iter().find(|t| t.event == event))?;
        self.resolve(transition)
    }

    pub fn dangling_transitions(&self) -> Vec<DanglingTransition> {
        let mut dangling = Vec::new();
        for state in self.states() {
            for t in &state.transitions {
                if self.resolve(t).is_none() {
                    dangling.push(DanglingTransition {
                        state: Some(state.name.clone()),
                        event: t.event.clone(),
                        target: t.target.clone(),
                    });
                }
            }
        }
        for t in &self.global_transitions {
            if self.resolve(t).is_none() {
                dangling.push(DanglingTransition {
                    state: None,
                    event: t.event.clone(),
                    target: t.target.clone(),
                });
            }
        }
        dangling
    }
}

// ===========================================================================
// Tests
// ===========================================================================
