//! # Unit Runtime
//!
//! Component lifecycle coordination for runtime entities ("units") assembled
//! from independently written components.
//!
//! ## Features
//!
//! - **Discovery**: registers the host-managed components already bound to
//!   the unit's backing object when it first initializes
//! - **Registry**: one instance per concrete component type, stable keys,
//!   registration order preserved
//! - **Lifecycle**: `Uninitialized -> Initializing -> Initialized -> Destroyed`
//!   with attach, initialize and detach hooks on every component
//! - **Update Scheduling**: per-tick dispatch to self-managed, update-capable
//!   components; host-managed components are ticked by the host
//!
//! ## Quick Start
//!
//! ```rust
//! use unit_runtime::prelude::*;
//!
//! #[derive(Default)]
//! struct Spin {
//!     core: ComponentCore,
//!     angle: f32,
//! }
//!
//! impl Component for Spin {
//!     fn core(&self) -> &ComponentCore {
//!         &self.core
//!     }
//!
//!     fn core_mut(&mut self) -> &mut ComponentCore {
//!         &mut self.core
//!     }
//!
//!     fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
//!         Some(self)
//!     }
//! }
//!
//! impl Updatable for Spin {
//!     fn on_update(&mut self, delta_time: f32) -> Result<(), ComponentError> {
//!         if self.is_enabled() {
//!             self.angle += delta_time;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), UnitError> {
//!     let unit = Unit::new("turret");
//!     let spin = unit.add_component(Spin::default())?.component;
//!
//!     unit.initialize()?;
//!     unit.tick(0.5)?;
//!     assert_eq!(spin.borrow().angle, 0.5);
//!
//!     unit.teardown()?;
//!     assert!(unit.is_empty());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod unit;

pub use config::{Config, ConfigError, UnitConfig};
pub use unit::{
    Attach, AttachOutcome, Component, ComponentCore, ComponentRef, RemoveOutcome, Unit,
    UnitBuilder, UnitError, UnitState, Updatable, WeakUnit,
};

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        config::{Config, UnitConfig},
        foundation::logging,
        unit::{
            Attach, AttachOutcome, BackingObject, BoundObject, Category, Component,
            ComponentCore, ComponentError, ComponentRef, ComponentState, Rejection,
            RemoveOutcome, Severity, Unit, UnitError, UnitHooks, UnitState, Updatable,
        },
    };
}
