//! Units: composite runtime objects built from independent components
//!
//! A [`Unit`] owns the registry of its components, drives their lifecycle and
//! ticks the update-capable ones. The host engine creates the unit, calls
//! [`Unit::initialize`] once, [`Unit::tick`] every frame and
//! [`Unit::teardown`] when the object goes away.
//!
//! ## Mutation during a pass
//!
//! While the unit is running an initialization sweep, a tick dispatch or a
//! teardown, structural changes requested on it (attach, remove, teardown)
//! are queued and applied in request order once the pass is over. Those
//! calls return a `Deferred` outcome. This lets a component detach itself
//! from inside its own `on_update`.

pub mod component;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use component::{
    Category, Component, ComponentCore, ComponentRef, ComponentState, TypeKey, Updatable,
    WeakComponentRef,
};
pub use diagnostics::{AttachOrigin, Diagnostic, DiagnosticJournal, Rejection, Severity};
pub use discovery::{BackingObject, BoundObject, DiscoveryReport};
pub use error::{ComponentError, LifecyclePhase, UnitError, UnitResult};
pub use lifecycle::{UnitHooks, UnitState};
pub use registry::ComponentKey;

use registry::{EntryFlags, Registry};
use scheduler::UpdateSchedule;

use crate::config::UnitConfig;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Result of an attach request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Registered under the given key
    Attached(ComponentKey),
    /// Queued until the running pass ends
    Deferred,
    /// Refused; the unit is unchanged
    Rejected(Rejection),
}

impl AttachOutcome {
    /// Whether the component was registered
    pub const fn is_attached(&self) -> bool {
        matches!(self, Self::Attached(_))
    }

    /// Registry key, if registered
    pub const fn key(&self) -> Option<ComponentKey> {
        match self {
            Self::Attached(key) => Some(*key),
            _ => None,
        }
    }

    /// Reason for refusal, if refused
    pub const fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }
}

/// Result of [`Unit::add_component`]
///
/// The typed handle is handed back whatever the outcome, so a refused
/// component is returned to the caller rather than dropped. For a
/// host-managed component this handle is what keeps it alive.
pub struct Attach<C> {
    /// What the unit did with the component
    pub outcome: AttachOutcome,
    /// Typed handle to the component
    pub component: Rc<RefCell<C>>,
}

impl<C> fmt::Debug for Attach<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attach")
            .field("outcome", &self.outcome)
            .field("component", &Rc::as_ptr(&self.component))
            .finish()
    }
}

/// Result of a remove request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Detached and removed from the registry and schedule
    Removed,
    /// Queued until the running pass ends
    Deferred,
    /// Not registered; nothing happened
    NotRegistered,
    /// Not registered, but its detach hook was run anyway
    DetachedUnregistered,
}

enum PendingOp {
    Attach(ComponentRef),
    Remove(ComponentRef),
    Teardown,
}

struct UnitInner {
    name: String,
    config: UnitConfig,
    state: Cell<UnitState>,
    registry: RefCell<Registry>,
    schedule: RefCell<UpdateSchedule>,
    journal: RefCell<DiagnosticJournal>,
    backing: RefCell<Option<Box<dyn BackingObject>>>,
    discovery: Cell<Option<DiscoveryReport>>,
    hooks: RefCell<Option<Box<dyn UnitHooks>>>,
    pass_depth: Cell<u32>,
    pending: RefCell<Vec<PendingOp>>,
}

/// Composite runtime object owning a set of components
///
/// `Unit` is a cheap handle; clones refer to the same unit. Components hold
/// a [`WeakUnit`] back to their owner, which never keeps the unit alive.
#[derive(Clone)]
pub struct Unit {
    inner: Rc<UnitInner>,
}

/// Non-owning reference to a [`Unit`]
#[derive(Clone)]
pub struct WeakUnit {
    inner: Weak<UnitInner>,
}

impl WeakUnit {
    /// The unit, if it is still alive
    pub fn upgrade(&self) -> Option<Unit> {
        self.inner.upgrade().map(|inner| Unit { inner })
    }

    /// Whether this reference points at `unit`
    pub fn points_to(&self, unit: &Unit) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Rc::as_ptr(&unit.inner))
    }
}

impl fmt::Debug for WeakUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(unit) => write!(f, "WeakUnit({})", unit.name()),
            None => f.write_str("WeakUnit(<dropped>)"),
        }
    }
}

/// Builder for [`Unit`]
pub struct UnitBuilder {
    name: String,
    config: UnitConfig,
    backing: Option<Box<dyn BackingObject>>,
    hooks: Option<Box<dyn UnitHooks>>,
}

impl UnitBuilder {
    /// Name used in diagnostics
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Lifecycle policies
    pub fn config(mut self, config: UnitConfig) -> Self {
        self.config = config;
        self
    }

    /// Host-side object whose bound components are discovered on initialize
    pub fn backing(mut self, backing: impl BackingObject + 'static) -> Self {
        self.backing = Some(Box::new(backing));
        self
    }

    /// Unit-level lifecycle hooks
    pub fn hooks(mut self, hooks: impl UnitHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    /// Create the unit in the `Uninitialized` state
    pub fn build(self) -> Unit {
        let journal = DiagnosticJournal::new(self.config.diagnostic_capacity);
        Unit {
            inner: Rc::new(UnitInner {
                name: self.name,
                config: self.config,
                state: Cell::new(UnitState::Uninitialized),
                registry: RefCell::new(Registry::new()),
                schedule: RefCell::new(UpdateSchedule::new()),
                journal: RefCell::new(journal),
                backing: RefCell::new(self.backing),
                discovery: Cell::new(None),
                hooks: RefCell::new(self.hooks),
                pass_depth: Cell::new(0),
                pending: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl Default for UnitBuilder {
    fn default() -> Self {
        Self {
            name: "unit".to_string(),
            config: UnitConfig::default(),
            backing: None,
            hooks: None,
        }
    }
}

impl Unit {
    /// Create a unit with default configuration and no backing object
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder().name(name).build()
    }

    /// Start building a unit
    pub fn builder() -> UnitBuilder {
        UnitBuilder::default()
    }

    /// Unit name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Active configuration
    pub fn config(&self) -> &UnitConfig {
        &self.inner.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> UnitState {
        self.inner.state.get()
    }

    /// Whether `initialize` has completed
    pub fn is_initialized(&self) -> bool {
        self.state() == UnitState::Initialized
    }

    /// Non-owning reference to this unit
    pub fn downgrade(&self) -> WeakUnit {
        WeakUnit {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same unit
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of registered components
    pub fn len(&self) -> usize {
        self.release_dropped();
        self.inner.registry.borrow().len()
    }

    /// Whether no component is registered
    pub fn is_empty(&self) -> bool {
        self.release_dropped();
        self.inner.registry.borrow().is_empty()
    }

    /// Outcome of discovery, once `initialize` has run it
    pub fn discovery_report(&self) -> Option<DiscoveryReport> {
        self.inner.discovery.get()
    }

    /// Registered components, in registration order
    pub fn components(&self) -> Vec<ComponentRef> {
        self.release_dropped();
        self.inner
            .registry
            .borrow()
            .snapshot()
            .into_iter()
            .map(|(_, component)| component)
            .collect()
    }

    /// Update-scheduled components, in dispatch order
    pub fn scheduled(&self) -> Vec<ComponentRef> {
        self.inner
            .schedule
            .borrow()
            .resolve(&self.inner.registry.borrow())
    }

    /// Whether this exact instance is registered
    pub fn contains(&self, component: &ComponentRef) -> bool {
        self.inner.registry.borrow().key_of(component).is_some()
    }

    /// Whether this exact instance is in the update schedule
    pub fn is_scheduled(&self, component: &ComponentRef) -> bool {
        let key = self.inner.registry.borrow().key_of(component);
        key.is_some_and(|key| self.inner.schedule.borrow().contains(key))
    }

    /// Shadow lifecycle state of a component relative to this unit
    pub fn component_state(&self, component: &ComponentRef) -> ComponentState {
        let registry = self.inner.registry.borrow();
        match registry.key_of(component).and_then(|key| registry.get(key)) {
            Some(entry) if entry.is_initialized() => ComponentState::Initialized,
            Some(_) => ComponentState::Attached,
            None => ComponentState::Detached,
        }
    }

    /// Category recorded when the component was attached, if it is registered
    pub fn component_category(&self, component: &ComponentRef) -> Option<Category> {
        let registry = self.inner.registry.borrow();
        registry
            .key_of(component)
            .and_then(|key| registry.get(key))
            .map(registry::Entry::category)
    }

    /// The registered component of concrete type `C`
    pub fn get_component<C: Component>(&self) -> Option<Rc<RefCell<C>>> {
        self.get_component_ref::<C>()
            .and_then(|component| component.downcast::<C>())
    }

    /// Untyped handle to the registered component of concrete type `C`
    pub fn get_component_ref<C: Component>(&self) -> Option<ComponentRef> {
        let registry = self.inner.registry.borrow();
        registry
            .key_of_type(TypeKey::of::<C>())
            .and_then(|key| registry.get(key))
            .and_then(registry::Entry::component)
    }

    /// First registered component, in registration order, matching `predicate`
    ///
    /// Components that are mutably borrowed at the time of the call (for
    /// example the one whose hook is asking) are skipped.
    pub fn find_component(
        &self,
        mut predicate: impl FnMut(&dyn Component) -> bool,
    ) -> Option<ComponentRef> {
        self.components().into_iter().find(|component| {
            component
                .try_borrow()
                .is_some_and(|borrowed| predicate(&*borrowed))
        })
    }

    /// Recorded diagnostics, oldest first
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.journal.borrow().entries().cloned().collect()
    }

    /// Number of recorded diagnostics with the given severity
    pub fn diagnostic_count(&self, severity: Severity) -> usize {
        self.inner.journal.borrow().count(severity)
    }

    /// Forget recorded diagnostics
    pub fn clear_diagnostics(&self) {
        self.inner.journal.borrow_mut().clear();
    }

    /// Hand `component` to the unit
    ///
    /// A self-managed component is owned by the unit from now on. A
    /// host-managed one is only referenced: it lives as long as the returned
    /// handle, or clones of it, are kept.
    ///
    /// # Errors
    ///
    /// Fails only if the component's own `on_attach` or `initialize` fails,
    /// in which case it stays registered. Policy refusals are reported
    /// through the outcome.
    pub fn add_component<C: Component>(&self, component: C) -> UnitResult<Attach<C>> {
        let component = Rc::new(RefCell::new(component));
        let outcome = self.attach(ComponentRef::from_rc(Rc::clone(&component)))?;
        Ok(Attach { outcome, component })
    }

    /// Attach an existing component instance
    ///
    /// The component's declared category decides whether it is host-managed.
    /// Attaching to an initialized unit initializes the component right away.
    ///
    /// # Errors
    ///
    /// Fails if the component is currently borrowed, or if its `on_attach`
    /// or `initialize` fails.
    pub fn attach(&self, component: ComponentRef) -> UnitResult<AttachOutcome> {
        if self.in_pass() {
            log::debug!(
                "unit `{}`: attach of {} deferred until the current pass ends",
                self.name(),
                component.type_name()
            );
            self.inner.pending.borrow_mut().push(PendingOp::Attach(component));
            return Ok(AttachOutcome::Deferred);
        }
        self.attach_now(component, AttachOrigin::Manual)
    }

    /// Detach and remove a component
    ///
    /// A component that is not registered is left alone unless
    /// [`UnitConfig::detach_unregistered_on_remove`] is set, and never when it
    /// belongs to another unit.
    ///
    /// # Errors
    ///
    /// Fails if the component is currently borrowed.
    pub fn remove_component(&self, component: &ComponentRef) -> UnitResult<RemoveOutcome> {
        if self.in_pass() {
            log::debug!(
                "unit `{}`: removal of {} deferred until the current pass ends",
                self.name(),
                component.type_name()
            );
            self.inner
                .pending
                .borrow_mut()
                .push(PendingOp::Remove(component.clone()));
            return Ok(RemoveOutcome::Deferred);
        }

        let key = self.inner.registry.borrow().key_of(component);
        if let Some(key) = key {
            self.detach_now(key, component)?;
            return Ok(RemoveOutcome::Removed);
        }

        if self.inner.config.detach_unregistered_on_remove {
            let mut borrowed = component.lock()?;
            let foreign = borrowed.owner().is_some_and(|owner| !owner.ptr_eq(self));
            if !foreign {
                borrowed.on_detach();
                borrowed.core_mut().unbind();
                return Ok(RemoveOutcome::DetachedUnregistered);
            }
        }

        log::debug!(
            "unit `{}`: {} is not registered, nothing to remove",
            self.name(),
            component.type_name()
        );
        Ok(RemoveOutcome::NotRegistered)
    }

    /// Detach and remove the component registered under `key`
    ///
    /// # Errors
    ///
    /// Fails if the component is currently borrowed.
    pub fn remove_by_key(&self, key: ComponentKey) -> UnitResult<RemoveOutcome> {
        let component = self
            .inner
            .registry
            .borrow()
            .get(key)
            .and_then(registry::Entry::component);
        match component {
            Some(component) => self.remove_component(&component),
            None => Ok(RemoveOutcome::NotRegistered),
        }
    }

    pub(crate) fn attach_now(
        &self,
        component: ComponentRef,
        origin: AttachOrigin,
    ) -> UnitResult<AttachOutcome> {
        if self.state() == UnitState::Destroyed {
            return Ok(self.reject(Rejection::UnitDestroyed, &component, origin));
        }
        self.release_dropped();

        let (declared, updatable) = {
            let mut borrowed = component.lock()?;
            (borrowed.category(), borrowed.as_updatable().is_some())
        };
        let category = match origin {
            AttachOrigin::Discovery => Category::HostManaged,
            AttachOrigin::Manual => declared,
        };

        let enforce_exclusion = origin == AttachOrigin::Discovery
            || self.inner.config.reject_updatable_host_components;
        if category == Category::HostManaged && updatable && enforce_exclusion {
            return Ok(self.reject(Rejection::UpdatableHostComponent, &component, origin));
        }

        let checked = self.inner.registry.borrow().check(&component);
        if let Err(rejection) = checked {
            return Ok(self.reject(rejection, &component, origin));
        }

        let flags = EntryFlags::from_capabilities(category, updatable);
        let key = self.inner.registry.borrow_mut().insert(&component, flags);

        {
            let mut borrowed = component.lock()?;
            borrowed.core_mut().bind(self.downgrade());
            borrowed.on_attach(self).map_err(|source| {
                UnitError::component(component.type_name(), LifecyclePhase::Attach, source)
            })?;
        }
        log::debug!(
            "unit `{}`: attached {} as {:?}",
            self.name(),
            component.type_name(),
            category
        );

        if self.state() == UnitState::Initialized {
            self.initialize_entry(key, &component)?;
        }
        Ok(AttachOutcome::Attached(key))
    }

    pub(crate) fn detach_now(
        &self,
        key: ComponentKey,
        component: &ComponentRef,
    ) -> UnitResult<()> {
        {
            let mut borrowed = component.lock()?;
            borrowed.on_detach();
            borrowed.core_mut().unbind();
        }
        self.inner.registry.borrow_mut().remove(key);
        self.inner.schedule.borrow_mut().withdraw(key);
        log::debug!("unit `{}`: detached {}", self.name(), component.type_name());
        Ok(())
    }

    /// Forget host-managed components the host has already dropped
    pub(crate) fn release_dropped(&self) {
        let Ok(mut registry) = self.inner.registry.try_borrow_mut() else {
            return;
        };
        let released = registry.prune_released();
        drop(registry);

        for (key, type_key) in released {
            self.inner.schedule.borrow_mut().withdraw(key);
            log::debug!(
                "unit `{}`: host released {}, entry dropped",
                self.name(),
                type_key
            );
        }
    }

    fn reject(
        &self,
        rejection: Rejection,
        component: &ComponentRef,
        origin: AttachOrigin,
    ) -> AttachOutcome {
        self.inner.journal.borrow_mut().record(
            self.name(),
            Diagnostic {
                rejection,
                component: component.type_name(),
                origin,
            },
        );
        AttachOutcome::Rejected(rejection)
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("components", &self.inner.registry.try_borrow().map(|r| r.len()).ok())
            .finish_non_exhaustive()
    }
}
