//! Component registry
//!
//! Entries live in a slot map so keys stay stable across removals. The
//! registration order is kept separately, and a `TypeKey` index enforces the
//! one-instance-per-concrete-type rule with a single lookup.
//!
//! Self-managed components are owned by their entry. Host-managed ones are
//! held through a weak handle and disappear from the registry once the host
//! drops its last strong handle.

use super::component::{Category, ComponentRef, TypeKey, WeakComponentRef};
use super::diagnostics::Rejection;
use bitflags::bitflags;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

new_key_type! {
    /// Stable key of a registered component
    pub struct ComponentKey;
}

bitflags! {
    /// Capabilities and progress of a registered component
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct EntryFlags: u8 {
        /// Lifetime controlled by the host
        const HOST_MANAGED = 1 << 0;
        /// Implements the update capability
        const UPDATABLE = 1 << 1;
        /// `initialize` has completed
        const INITIALIZED = 1 << 2;
    }
}

impl EntryFlags {
    /// Flags derived from a component's declared capabilities
    pub(crate) fn from_capabilities(category: Category, updatable: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::HOST_MANAGED, category == Category::HostManaged);
        flags.set(Self::UPDATABLE, updatable);
        flags
    }

    /// Whether the update scheduler should dispatch to this entry
    pub(crate) fn is_schedulable(self) -> bool {
        self.contains(Self::UPDATABLE) && !self.contains(Self::HOST_MANAGED)
    }
}

#[derive(Debug)]
enum Handle {
    Owned(ComponentRef),
    Hosted(WeakComponentRef),
}

/// A registered component with the flags computed when it was attached
#[derive(Debug)]
pub(crate) struct Entry {
    handle: Handle,
    type_key: TypeKey,
    flags: EntryFlags,
}

impl Entry {
    /// Strong handle, `None` once the host has released the component
    pub(crate) fn component(&self) -> Option<ComponentRef> {
        match &self.handle {
            Handle::Owned(component) => Some(component.clone()),
            Handle::Hosted(component) => component.upgrade(),
        }
    }

    /// Flags cached at attach time
    pub(crate) const fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Ownership category
    pub(crate) fn category(&self) -> Category {
        if self.flags.contains(EntryFlags::HOST_MANAGED) {
            Category::HostManaged
        } else {
            Category::SelfManaged
        }
    }

    /// Whether `initialize` has completed
    pub(crate) fn is_initialized(&self) -> bool {
        self.flags.contains(EntryFlags::INITIALIZED)
    }

    fn holds(&self, component: &ComponentRef) -> bool {
        match &self.handle {
            Handle::Owned(owned) => owned.ptr_eq(component),
            Handle::Hosted(hosted) => hosted.points_to(component),
        }
    }

    fn is_released(&self) -> bool {
        matches!(&self.handle, Handle::Hosted(hosted) if hosted.is_released())
    }
}

/// Authoritative list of a unit's components
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: SlotMap<ComponentKey, Entry>,
    order: Vec<ComponentKey>,
    by_type: HashMap<TypeKey, ComponentKey>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Check the uniqueness rules for a component about to be registered
    pub(crate) fn check(&self, component: &ComponentRef) -> Result<(), Rejection> {
        match self.by_type.get(&component.type_key()) {
            Some(&key) if self.entries[key].holds(component) => {
                Err(Rejection::DuplicateInstance)
            }
            Some(_) => Err(Rejection::DuplicateType),
            None => Ok(()),
        }
    }

    /// Append a component; the caller must have passed [`Registry::check`]
    ///
    /// Host-managed components are stored through a weak handle.
    pub(crate) fn insert(&mut self, component: &ComponentRef, flags: EntryFlags) -> ComponentKey {
        let type_key = component.type_key();
        let handle = if flags.contains(EntryFlags::HOST_MANAGED) {
            Handle::Hosted(component.downgrade())
        } else {
            Handle::Owned(component.clone())
        };
        let key = self.entries.insert(Entry {
            handle,
            type_key,
            flags,
        });
        self.order.push(key);
        self.by_type.insert(type_key, key);
        key
    }

    /// Remove a component by key
    pub(crate) fn remove(&mut self, key: ComponentKey) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|&k| k != key);
        self.by_type.remove(&entry.type_key);
        Some(entry)
    }

    /// Drop entries whose host-managed component no longer exists
    pub(crate) fn prune_released(&mut self) -> Vec<(ComponentKey, TypeKey)> {
        let released: Vec<_> = self
            .iter()
            .filter(|(_, entry)| entry.is_released())
            .map(|(key, entry)| (key, entry.type_key))
            .collect();
        for &(key, _) in &released {
            self.remove(key);
        }
        released
    }

    /// Key of a registered instance
    pub(crate) fn key_of(&self, component: &ComponentRef) -> Option<ComponentKey> {
        self.by_type
            .get(&component.type_key())
            .copied()
            .filter(|&key| self.entries[key].holds(component))
    }

    /// Key of the registered component with the given concrete type
    pub(crate) fn key_of_type(&self, type_key: TypeKey) -> Option<ComponentKey> {
        self.by_type.get(&type_key).copied()
    }

    /// Position of `key` in registration order
    pub(crate) fn position(&self, key: ComponentKey) -> Option<usize> {
        self.order.iter().position(|&k| k == key)
    }

    pub(crate) fn get(&self, key: ComponentKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Record that a component finished `initialize`
    pub(crate) fn mark_initialized(&mut self, key: ComponentKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.flags.insert(EntryFlags::INITIALIZED);
        }
    }

    /// Entries in registration order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ComponentKey, &Entry)> + '_ {
        self.order.iter().map(move |&key| (key, &self.entries[key]))
    }

    /// Registration-ordered snapshot of keys and live handles
    pub(crate) fn snapshot(&self) -> Vec<(ComponentKey, ComponentRef)> {
        self.iter()
            .filter_map(|(key, entry)| entry.component().map(|component| (key, component)))
            .collect()
    }

    /// Registration-ordered snapshot of components that still need `initialize`
    pub(crate) fn uninitialized(&self) -> Vec<(ComponentKey, ComponentRef)> {
        self.iter()
            .filter(|(_, entry)| !entry.is_initialized())
            .filter_map(|(key, entry)| entry.component().map(|component| (key, component)))
            .collect()
    }

    /// Drop every entry
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.by_type.clear();
    }
}
