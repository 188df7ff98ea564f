//! Unit lifecycle state machine
//!
//! `Uninitialized -> Initializing -> Initialized -> Destroyed`. The
//! `Initializing` state only exists for the duration of one `initialize`
//! call, and nothing leaves `Destroyed`.

use super::component::ComponentRef;
use super::error::{ComponentError, LifecyclePhase, UnitError, UnitResult};
use super::registry::{ComponentKey, Entry};
use super::{AttachOrigin, PendingOp, Unit};
use std::fmt;

/// Lifecycle state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Created, `initialize` not called yet
    Uninitialized,
    /// Inside the one `initialize` call
    Initializing,
    /// Ready; ticks are dispatched
    Initialized,
    /// Torn down; terminal
    Destroyed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Unit-level lifecycle hooks
///
/// Use these for setup that components may rely on: `on_initialize` runs
/// after discovery and before any component is initialized.
pub trait UnitHooks {
    /// Unit-level setup
    fn on_initialize(&mut self, _unit: &Unit) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Runs at the start of teardown, while components are still attached
    fn on_teardown(&mut self, _unit: &Unit) {}
}

impl Unit {
    /// Discover, set up and initialize the unit
    ///
    /// Runs discovery, the unit's `on_initialize` hook, then `initialize` on
    /// every registered component in registration order. Calling it again
    /// has no effect, and so does calling it on a destroyed unit.
    ///
    /// # Errors
    ///
    /// The first failure (attach hook during discovery, unit hook, or a
    /// component's `initialize`) aborts the call. The unit still ends up
    /// `Initialized` and none of the steps are retried. A component whose
    /// `initialize` failed is never scheduled.
    pub fn initialize(&self) -> UnitResult<()> {
        match self.state() {
            UnitState::Uninitialized => {}
            UnitState::Initializing | UnitState::Initialized => return Ok(()),
            UnitState::Destroyed => {
                log::warn!("unit `{}`: initialize called after teardown", self.name());
                return Ok(());
            }
        }

        self.transition(UnitState::Initializing);
        let result = self
            .discover()
            .and_then(|report| {
                self.inner.discovery.set(Some(report));
                self.run_initialize_hook()
            })
            .and_then(|()| {
                self.enter_pass();
                let swept = self.initialize_components();
                self.leave_pass();
                swept
            });

        self.transition(UnitState::Initialized);

        let flushed = self.flush_pending();
        result.and(flushed)
    }

    /// Detach every component and destroy the unit
    ///
    /// Runs once; later calls do nothing. Both the registry and the update
    /// schedule are empty afterwards and every detached component has lost
    /// its owner link. Requested from inside `initialize` or any other pass,
    /// it runs as soon as that call is done.
    ///
    /// # Errors
    ///
    /// Reports the first component that could not be detached because it was
    /// borrowed. Teardown still completes for everything else.
    pub fn teardown(&self) -> UnitResult<()> {
        if self.state() == UnitState::Destroyed {
            return Ok(());
        }
        if self.in_pass() || self.state() == UnitState::Initializing {
            log::debug!(
                "unit `{}`: teardown deferred until the current pass ends",
                self.name()
            );
            self.inner.pending.borrow_mut().push(PendingOp::Teardown);
            return Ok(());
        }

        self.enter_pass();
        self.run_teardown_hook();

        self.release_dropped();
        let mut result = Ok(());
        let snapshot = self.inner.registry.borrow().snapshot();
        for (key, component) in snapshot {
            if let Err(error) = self.detach_now(key, &component) {
                log::error!("unit `{}`: teardown could not detach: {}", self.name(), error);
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        self.inner.registry.borrow_mut().clear();
        self.inner.schedule.borrow_mut().clear();
        self.transition(UnitState::Destroyed);
        self.leave_pass();

        let flushed = self.flush_pending();
        result.and(flushed)
    }

    pub(crate) fn initialize_entry(
        &self,
        key: ComponentKey,
        component: &ComponentRef,
    ) -> UnitResult<()> {
        component.lock()?.initialize().map_err(|source| {
            UnitError::component(component.type_name(), LifecyclePhase::Initialize, source)
        })?;

        // Scheduling waits for a successful initialize
        let flags = {
            let mut registry = self.inner.registry.borrow_mut();
            registry.mark_initialized(key);
            registry.get(key).map(Entry::flags)
        };
        let scheduled = flags.is_some_and(|flags| {
            self.inner
                .schedule
                .borrow_mut()
                .admit(key, flags, &self.inner.registry.borrow())
        });
        log::debug!(
            "unit `{}`: initialized {}{}",
            self.name(),
            component.type_name(),
            if scheduled { ", scheduled" } else { "" }
        );
        Ok(())
    }

    fn initialize_components(&self) -> UnitResult<()> {
        let pending = self.inner.registry.borrow().uninitialized();
        for (key, component) in pending {
            self.initialize_entry(key, &component)?;
        }
        Ok(())
    }

    fn run_initialize_hook(&self) -> UnitResult<()> {
        let hooks = self.inner.hooks.borrow_mut().take();
        let Some(mut hooks) = hooks else {
            return Ok(());
        };
        let result = hooks.on_initialize(self);
        *self.inner.hooks.borrow_mut() = Some(hooks);

        result.map_err(|source| UnitError::Hook {
            unit: self.name().to_string(),
            source,
        })
    }

    fn run_teardown_hook(&self) {
        let hooks = self.inner.hooks.borrow_mut().take();
        if let Some(mut hooks) = hooks {
            hooks.on_teardown(self);
            *self.inner.hooks.borrow_mut() = Some(hooks);
        }
    }

    fn transition(&self, to: UnitState) {
        let from = self.inner.state.replace(to);
        log::debug!("unit `{}`: {} -> {}", self.name(), from, to);
    }

    pub(crate) fn in_pass(&self) -> bool {
        self.inner.pass_depth.get() > 0
    }

    pub(crate) fn enter_pass(&self) {
        self.inner.pass_depth.set(self.inner.pass_depth.get() + 1);
    }

    pub(crate) fn leave_pass(&self) {
        self.inner.pass_depth.set(self.inner.pass_depth.get().saturating_sub(1));
    }

    /// Apply operations queued during a pass, in request order
    ///
    /// Every queued operation is applied even if an earlier one fails; the
    /// first failure is returned.
    pub(crate) fn flush_pending(&self) -> UnitResult<()> {
        if self.in_pass() {
            return Ok(());
        }

        let mut result = Ok(());
        loop {
            let ops = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if ops.is_empty() {
                break;
            }
            for op in ops {
                let applied = match op {
                    PendingOp::Attach(component) => self
                        .attach_now(component, AttachOrigin::Manual)
                        .map(|_| ()),
                    PendingOp::Remove(component) => {
                        self.remove_component(&component).map(|_| ())
                    }
                    PendingOp::Teardown => self.teardown(),
                };
                if let Err(error) = applied {
                    if result.is_ok() {
                        result = Err(error);
                    }
                }
            }
        }
        result
    }
}
