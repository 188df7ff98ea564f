//! Component contract and shared component handles
//!
//! Every component embeds a [`ComponentCore`] holding the owner link and the
//! enabled flag. The unit is the only writer of the owner link: it binds the
//! core right before `on_attach` and unbinds it right after `on_detach`.

use super::error::{ComponentError, UnitError, UnitResult};
use super::{Unit, WeakUnit};
use std::any::{type_name, Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

/// Who controls a component's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Lifetime belongs to the host engine; the unit holds a non-owning handle
    /// and never schedules its updates.
    HostManaged,
    /// Ownership was transferred to the unit; eligible for update scheduling.
    SelfManaged,
}

/// Per-component shadow state as seen by one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    /// Not registered with the unit
    Detached,
    /// Registered, `initialize` not yet run
    Attached,
    /// Registered and initialized
    Initialized,
}

/// State every component carries on behalf of its owning unit
pub struct ComponentCore {
    owner: Option<WeakUnit>,
    enabled: bool,
}

impl ComponentCore {
    /// Create a detached, enabled core
    pub const fn new() -> Self {
        Self {
            owner: None,
            enabled: true,
        }
    }

    /// Create a detached core that starts disabled
    pub const fn disabled() -> Self {
        Self {
            owner: None,
            enabled: false,
        }
    }

    /// The owning unit, if attached and still alive
    pub fn owner(&self) -> Option<Unit> {
        self.owner.as_ref().and_then(WeakUnit::upgrade)
    }

    /// Whether the core is bound to a unit
    pub const fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// Whether the core is bound to this particular unit
    pub fn is_owned_by(&self, unit: &Unit) -> bool {
        self.owner.as_ref().is_some_and(|owner| owner.points_to(unit))
    }

    /// Enabled flag
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the enabled flag
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn bind(&mut self, owner: WeakUnit) {
        self.owner = Some(owner);
    }

    pub(crate) fn unbind(&mut self) {
        self.owner = None;
    }
}

impl Default for ComponentCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCore")
            .field("attached", &self.has_owner())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Behavior unit attached to a [`Unit`]
///
/// Category and update capability are read once when the component is
/// attached and cached in the registry entry, so implementations must answer
/// them the same way for the whole life of the value.
pub trait Component: Any {
    /// Shared core state
    fn core(&self) -> &ComponentCore;

    /// Mutable shared core state
    fn core_mut(&mut self) -> &mut ComponentCore;

    /// Ownership category of this component type
    fn category(&self) -> Category {
        Category::SelfManaged
    }

    /// One-time setup, run when the unit initializes or, for components added
    /// to an initialized unit, right after attach.
    fn initialize(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Owner-dependent setup. The owner link is already set when this runs.
    fn on_attach(&mut self, _owner: &Unit) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Release owner-dependent state. The owner link is cleared afterwards.
    fn on_detach(&mut self) {}

    /// Enable the component
    fn enable(&mut self) {
        self.core_mut().set_enabled(true);
    }

    /// Disable the component; dispatch still happens, the component filters itself
    fn disable(&mut self) {
        self.core_mut().set_enabled(false);
    }

    /// Enabled flag
    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// The owning unit, if any
    fn owner(&self) -> Option<Unit> {
        self.core().owner()
    }

    /// Update capability, `None` for components that are not ticked by the unit
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        None
    }
}

/// Optional per-tick extension of [`Component`]
pub trait Updatable {
    /// Called once per unit tick while the component is scheduled
    fn on_update(&mut self, delta_time: f32) -> Result<(), ComponentError>;
}

/// Concrete component type, used as the uniqueness key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the concrete type `C`
    pub fn of<C: Any>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: type_name::<C>(),
        }
    }

    /// Runtime type id
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Type name, for diagnostics only
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Shared handle to a component instance
///
/// Cloning the handle clones the reference, not the component. Two handles
/// are the same instance when [`ComponentRef::ptr_eq`] holds.
#[derive(Clone)]
pub struct ComponentRef {
    cell: Rc<RefCell<dyn Component>>,
    any: Rc<dyn Any>,
    type_key: TypeKey,
}

impl ComponentRef {
    /// Wrap a fresh component
    pub fn new<C: Component>(component: C) -> Self {
        Self::from_rc(Rc::new(RefCell::new(component)))
    }

    /// Wrap an existing shared component
    pub fn from_rc<C: Component>(component: Rc<RefCell<C>>) -> Self {
        let cell: Rc<RefCell<dyn Component>> = component.clone();
        Self {
            cell,
            any: component,
            type_key: TypeKey::of::<C>(),
        }
    }

    /// Typed handle, if the component is a `C`
    pub fn downcast<C: Component>(&self) -> Option<Rc<RefCell<C>>> {
        Rc::clone(&self.any).downcast::<RefCell<C>>().ok()
    }

    /// Whether the component's concrete type is `C`
    pub fn is<C: Component>(&self) -> bool {
        self.type_key.id == TypeId::of::<C>()
    }

    /// Whether both handles point at the same instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.address(), other.address())
    }

    /// Non-owning handle to the same instance
    pub fn downgrade(&self) -> WeakComponentRef {
        WeakComponentRef {
            cell: Rc::downgrade(&self.cell),
            any: Rc::downgrade(&self.any),
            address: self.address(),
            type_key: self.type_key,
        }
    }

    fn address(&self) -> *const () {
        Rc::as_ptr(&self.any).cast::<()>()
    }

    /// Uniqueness key of the concrete type
    pub const fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Concrete type name
    pub const fn type_name(&self) -> &'static str {
        self.type_key.name
    }

    /// Immutably borrow the component
    ///
    /// # Panics
    ///
    /// Panics if the component is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, dyn Component> {
        self.cell.borrow()
    }

    /// Mutably borrow the component
    ///
    /// # Panics
    ///
    /// Panics if the component is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Component> {
        self.cell.borrow_mut()
    }

    /// Immutably borrow the component, `None` if it is mutably borrowed
    pub fn try_borrow(&self) -> Option<Ref<'_, dyn Component>> {
        self.cell.try_borrow().ok()
    }

    pub(crate) fn lock(&self) -> UnitResult<RefMut<'_, dyn Component>> {
        self.cell.try_borrow_mut().map_err(|_| UnitError::ComponentBusy {
            component: self.type_name(),
        })
    }
}

/// Non-owning handle to a component whose lifetime belongs to the host
#[derive(Clone)]
pub struct WeakComponentRef {
    cell: Weak<RefCell<dyn Component>>,
    any: Weak<dyn Any>,
    address: *const (),
    type_key: TypeKey,
}

impl WeakComponentRef {
    /// Strong handle, if the component is still alive
    pub fn upgrade(&self) -> Option<ComponentRef> {
        Some(ComponentRef {
            cell: self.cell.upgrade()?,
            any: self.any.upgrade()?,
            type_key: self.type_key,
        })
    }

    /// Whether every strong handle has been dropped
    pub fn is_released(&self) -> bool {
        self.any.strong_count() == 0
    }

    /// Whether this handle refers to the same instance as `component`
    pub fn points_to(&self, component: &ComponentRef) -> bool {
        std::ptr::eq(self.address, component.address())
    }

    /// Uniqueness key of the concrete type
    pub const fn type_key(&self) -> TypeKey {
        self.type_key
    }
}

impl fmt::Debug for WeakComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakComponentRef")
            .field("type", &self.type_key.name)
            .field("released", &self.is_released())
            .finish()
    }
}

impl<C: Component> From<Rc<RefCell<C>>> for ComponentRef {
    fn from(component: Rc<RefCell<C>>) -> Self {
        Self::from_rc(component)
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("type", &self.type_key.name)
            .field("ptr", &self.address())
            .finish()
    }
}
