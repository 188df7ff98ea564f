//! Test components shared by the unit scenario tests

use crate::foundation::logging;
use crate::unit::{
    AttachOutcome, Category, Component, ComponentCore, ComponentError, LifecyclePhase,
    RemoveOutcome, Unit, UnitHooks, Updatable,
};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

/// Shared, ordered record of hook calls
pub type Events = Rc<RefCell<Vec<String>>>;

pub fn events() -> Events {
    logging::init_for_tests();
    Rc::new(RefCell::new(Vec::new()))
}

/// Shared handle standing in for a component owned by the host engine
pub fn hosted<C>(component: C) -> Rc<RefCell<C>> {
    Rc::new(RefCell::new(component))
}

pub fn count(events: &Events, entry: &str) -> usize {
    events.borrow().iter().filter(|e| *e == entry).count()
}

pub struct KindA;
pub struct KindB;
pub struct KindC;

/// Configurable component that records every hook call
///
/// `Probe<KindA>` and `Probe<KindB>` are distinct concrete types.
pub struct Probe<K> {
    core: ComponentCore,
    events: Events,
    label: &'static str,
    category: Category,
    updatable: bool,
    fail_on: Option<LifecyclePhase>,
    pub updates: u32,
    pub last_delta: f32,
    _kind: PhantomData<K>,
}

impl<K: 'static> Probe<K> {
    pub fn new(label: &'static str, events: &Events) -> Self {
        Self {
            core: ComponentCore::new(),
            events: Rc::clone(events),
            label,
            category: Category::SelfManaged,
            updatable: false,
            fail_on: None,
            updates: 0,
            last_delta: 0.0,
            _kind: PhantomData,
        }
    }

    pub fn updatable(mut self) -> Self {
        self.updatable = true;
        self
    }

    pub fn host_managed(mut self) -> Self {
        self.category = Category::HostManaged;
        self
    }

    pub fn failing(mut self, phase: LifecyclePhase) -> Self {
        self.fail_on = Some(phase);
        self
    }

    fn record(&self, hook: &str) -> Result<(), ComponentError> {
        self.events.borrow_mut().push(format!("{}:{}", self.label, hook));
        match self.fail_on {
            Some(phase) if phase.to_string() == hook => {
                Err(ComponentError::Custom(format!("{} refused {}", self.label, hook)))
            }
            _ => Ok(()),
        }
    }
}

impl<K: 'static> Component for Probe<K> {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn category(&self) -> Category {
        self.category
    }

    fn initialize(&mut self) -> Result<(), ComponentError> {
        self.record("initialize")
    }

    fn on_attach(&mut self, _owner: &Unit) -> Result<(), ComponentError> {
        self.record("attach")
    }

    fn on_detach(&mut self) {
        self.events.borrow_mut().push(format!("{}:detach", self.label));
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        if self.updatable {
            Some(self)
        } else {
            None
        }
    }
}

impl<K: 'static> Updatable for Probe<K> {
    fn on_update(&mut self, delta_time: f32) -> Result<(), ComponentError> {
        self.updates += 1;
        self.last_delta = delta_time;
        self.record("update")
    }
}

/// Removes itself from its owner on the given update
pub struct SelfRemoving {
    core: ComponentCore,
    events: Events,
    remove_on: u32,
    pub updates: u32,
    pub outcome: Option<RemoveOutcome>,
}

impl SelfRemoving {
    pub fn new(remove_on: u32, events: &Events) -> Self {
        Self {
            core: ComponentCore::new(),
            events: Rc::clone(events),
            remove_on,
            updates: 0,
            outcome: None,
        }
    }
}

impl Component for SelfRemoving {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn on_detach(&mut self) {
        self.events.borrow_mut().push("self_removing:detach".to_string());
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for SelfRemoving {
    fn on_update(&mut self, _delta_time: f32) -> Result<(), ComponentError> {
        self.updates += 1;
        if self.updates != self.remove_on {
            return Ok(());
        }

        let owner = self.owner().ok_or(ComponentError::MissingOwner)?;
        let me = owner
            .get_component_ref::<Self>()
            .ok_or_else(|| ComponentError::State("not registered with its owner".to_string()))?;
        let outcome = owner
            .remove_component(&me)
            .map_err(|e| ComponentError::Custom(e.to_string()))?;
        self.outcome = Some(outcome);
        Ok(())
    }
}

/// Adds a `Probe<KindB>` to its owner, either from `initialize` or from its
/// first update
pub struct Spawner {
    core: ComponentCore,
    events: Events,
    on_initialize: bool,
    spawned: bool,
    pub outcome: Option<AttachOutcome>,
}

impl Spawner {
    pub fn during_initialize(events: &Events) -> Self {
        Self::new(true, events)
    }

    pub fn during_update(events: &Events) -> Self {
        Self::new(false, events)
    }

    fn new(on_initialize: bool, events: &Events) -> Self {
        Self {
            core: ComponentCore::new(),
            events: Rc::clone(events),
            on_initialize,
            spawned: false,
            outcome: None,
        }
    }

    fn spawn(&mut self) -> Result<(), ComponentError> {
        if self.spawned {
            return Ok(());
        }
        self.spawned = true;

        let owner = self.owner().ok_or(ComponentError::MissingOwner)?;
        let attach = owner
            .add_component(Probe::<KindB>::new("spawned", &self.events).updatable())
            .map_err(|e| ComponentError::Custom(e.to_string()))?;
        self.outcome = Some(attach.outcome);
        Ok(())
    }
}

impl Component for Spawner {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn initialize(&mut self) -> Result<(), ComponentError> {
        if self.on_initialize {
            self.spawn()?;
        }
        Ok(())
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Spawner {
    fn on_update(&mut self, _delta_time: f32) -> Result<(), ComponentError> {
        if !self.on_initialize {
            self.spawn()?;
        }
        Ok(())
    }
}

/// Unit hooks that record into the shared event list
pub struct RecordingHooks {
    pub events: Events,
    pub fail: bool,
}

impl UnitHooks for RecordingHooks {
    fn on_initialize(&mut self, unit: &Unit) -> Result<(), ComponentError> {
        self.events
            .borrow_mut()
            .push(format!("unit:initialize:{}", unit.len()));
        if self.fail {
            return Err(ComponentError::Custom("unit setup failed".to_string()));
        }
        Ok(())
    }

    fn on_teardown(&mut self, unit: &Unit) {
        self.events
            .borrow_mut()
            .push(format!("unit:teardown:{}", unit.len()));
    }
}
