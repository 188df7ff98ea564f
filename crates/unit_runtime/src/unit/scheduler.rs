//! Update scheduler
//!
//! Keeps the ordered subset of registered components that the unit ticks
//! itself: self-managed and update-capable. Host-managed components are
//! ticked by the host and never enter this list.

use super::component::ComponentRef;
use super::error::{LifecyclePhase, UnitError, UnitResult};
use super::registry::{ComponentKey, Entry, EntryFlags, Registry};
use super::{Unit, UnitState};

/// Ordered list of components dispatched on every tick
#[derive(Debug, Default)]
pub(crate) struct UpdateSchedule {
    keys: Vec<ComponentKey>,
}

impl UpdateSchedule {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert `key` if its flags make it schedulable; returns whether it was added
    ///
    /// The schedule follows registration order, even when a component is
    /// admitted after others that were registered later than it.
    pub(crate) fn admit(
        &mut self,
        key: ComponentKey,
        flags: EntryFlags,
        registry: &Registry,
    ) -> bool {
        if !flags.is_schedulable() || self.keys.contains(&key) {
            return false;
        }
        let rank = registry.position(key);
        let at = self
            .keys
            .iter()
            .position(|&k| registry.position(k) > rank)
            .unwrap_or(self.keys.len());
        self.keys.insert(at, key);
        true
    }

    /// Drop `key` from the schedule; returns whether it was scheduled
    pub(crate) fn withdraw(&mut self, key: ComponentKey) -> bool {
        let before = self.keys.len();
        self.keys.retain(|&k| k != key);
        self.keys.len() != before
    }

    pub(crate) fn contains(&self, key: ComponentKey) -> bool {
        self.keys.contains(&key)
    }

    /// Resolve the schedule to live component handles, in dispatch order
    pub(crate) fn resolve(&self, registry: &Registry) -> Vec<ComponentRef> {
        self.keys
            .iter()
            .filter_map(|&key| registry.get(key))
            .filter_map(Entry::component)
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }
}

impl Unit {
    /// Advance every scheduled component by `delta_time`
    ///
    /// Does nothing until the unit is initialized. The enabled flag is not
    /// consulted: disabled components still receive `on_update` and are
    /// expected to skip their own work. Components attached or removed while
    /// the dispatch is running take effect when it ends, so an addition is
    /// first ticked on the next call.
    ///
    /// # Errors
    ///
    /// The first failing `on_update` aborts the pass; later components are
    /// not ticked this frame.
    pub fn tick(&self, delta_time: f32) -> UnitResult<()> {
        if self.state() != UnitState::Initialized {
            return Ok(());
        }

        self.release_dropped();
        let targets = self
            .inner
            .schedule
            .borrow()
            .resolve(&self.inner.registry.borrow());
        log::trace!(
            "unit `{}`: tick {:.4} -> {} component(s)",
            self.name(),
            delta_time,
            targets.len()
        );

        self.enter_pass();
        let result = self.dispatch(&targets, delta_time);
        self.leave_pass();

        let flushed = self.flush_pending();
        result.and(flushed)
    }

    /// Call `on_update` on every target, stopping at the first failure
    fn dispatch(&self, targets: &[ComponentRef], delta_time: f32) -> UnitResult<()> {
        for target in targets {
            let mut component = target.lock()?;
            let Some(updatable) = component.as_updatable() else {
                log::trace!(
                    "unit `{}`: {} lost its update capability, skipped",
                    self.name(),
                    target.type_name()
                );
                continue;
            };
            updatable.on_update(delta_time).map_err(|source| {
                UnitError::component(target.type_name(), LifecyclePhase::Update, source)
            })?;
        }
        Ok(())
    }
}
