//! Randopatch Core -- live patching of a host's state machines and scenes.
//!
//! This crate models the host's pre-built finite-state machines as mutable
//! graphs, compiles an item/location placement list into an ordered program
//! of patch actions, and dispatches those actions as the host reports scene,
//! FSM and death events.
//!
//! # Flow
//!
//! 1. **Catalog** -- Location, item and shop descriptors are registered on a
//!    [`catalog::CatalogBuilder`] and frozen into a [`catalog::Catalog`].
//! 2. **Compile** -- [`compiler::compile`] turns placements plus
//!    [`settings::SessionSettings`] into a [`patch::PatchRegistry`].
//! 3. **Dispatch** -- A [`dispatch::Dispatcher`] holds the registry and
//!    applies matching patches for each host event, isolating failures.
//!
//! ```rust,ignore
//! let registry = compile(&placements, &settings, &catalog);
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.load(registry);
//! dispatcher.object_appeared(&mut scene, &factory);
//! dispatcher.enable_scene_fsms(&mut scene);
//! ```
//!
//! # Key Types
//!
//! - [`fsm::Fsm`] -- State graph with generation-checked state handles,
//!   lazily resolved transitions and typed variable families.
//! - [`step::Step`] -- Object-safe step trait; [`step::HostStep`] and
//!   [`step::RandoStep`] are the two concrete families.
//! - [`scene::Scene`] -- Arena of named host objects in a hierarchy.
//! - [`patch::PatchAction`] -- One compiled edit with its match predicate.

pub mod catalog;
pub mod compiler;
pub mod content;
pub mod death_edit;
pub mod dispatch;
pub mod fsm;
pub mod fsm_edit;
pub mod id;
pub mod object_edit;
pub mod patch;
pub mod prefab;
pub mod scene;
pub mod settings;
pub mod step;
pub mod variable;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
