//! Uniqueness, removal and lookup rules

use super::support::{count, events, KindA, KindB, KindC, Probe};
use crate::config::UnitConfig;
use crate::unit::{
    AttachOrigin, AttachOutcome, Category, Component, ComponentRef, ComponentState, Rejection,
    RemoveOutcome, Severity, Unit,
};

#[test]
fn test_second_instance_of_type_is_rejected() {
    let events = events();
    let unit = Unit::new("unique");
    unit.initialize().unwrap();

    let x = unit
        .add_component(Probe::<KindA>::new("x", &events).updatable())
        .unwrap();
    let y = unit
        .add_component(Probe::<KindA>::new("y", &events).updatable())
        .unwrap();

    assert!(x.outcome.is_attached());
    assert_eq!(y.outcome, AttachOutcome::Rejected(Rejection::DuplicateType));
    assert_eq!(unit.len(), 1);
    assert!(unit
        .components()
        .first()
        .unwrap()
        .ptr_eq(&ComponentRef::from_rc(x.component)));
    assert_eq!(count(&events, "y:attach"), 0);
    assert!(y.component.borrow().owner().is_none());
    assert_eq!(unit.diagnostic_count(Severity::Warning), 1);
}

#[test]
fn test_same_instance_attached_once() {
    let events = events();
    let unit = Unit::new("instance");
    let shared = ComponentRef::new(Probe::<KindA>::new("a", &events).updatable());

    let first = unit.attach(shared.clone()).unwrap();
    let second = unit.attach(shared.clone()).unwrap();

    assert!(first.is_attached());
    assert_eq!(second.rejection(), Some(Rejection::DuplicateInstance));
    assert_eq!(unit.len(), 1);
    assert_eq!(count(&events, "a:attach"), 1);

    unit.initialize().unwrap();
    assert_eq!(unit.scheduled().len(), 1);

    let diagnostics = unit.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].origin, AttachOrigin::Manual);
    assert_eq!(diagnostics[0].component, shared.type_name());
}

#[test]
fn test_manual_updatable_host_component_rejected() {
    let events = events();
    let unit = Unit::new("strict");

    let attach = unit
        .add_component(Probe::<KindA>::new("a", &events).host_managed().updatable())
        .unwrap();

    assert_eq!(
        attach.outcome.rejection(),
        Some(Rejection::UpdatableHostComponent)
    );
    assert!(unit.is_empty());
    assert_eq!(unit.diagnostic_count(Severity::Error), 1);
}

#[test]
fn test_permissive_config_registers_but_never_schedules() {
    let events = events();
    let unit = Unit::builder()
        .config(UnitConfig {
            reject_updatable_host_components: false,
            ..UnitConfig::default()
        })
        .build();
    unit.initialize().unwrap();

    let attach = unit
        .add_component(Probe::<KindA>::new("a", &events).host_managed().updatable())
        .unwrap();
    unit.tick(0.5).unwrap();

    assert!(attach.outcome.is_attached());
    assert_eq!(unit.len(), 1);
    assert!(unit.scheduled().is_empty());
    assert_eq!(attach.component.borrow().updates, 0);
    assert_eq!(unit.diagnostic_count(Severity::Error), 0);
}

#[test]
fn test_remove_scheduled_component() {
    let events = events();
    let unit = Unit::new("remove");
    let x = unit
        .add_component(Probe::<KindA>::new("x", &events).updatable())
        .unwrap()
        .component;
    unit.initialize().unwrap();
    unit.tick(0.1).unwrap();
    let handle = ComponentRef::from_rc(x.clone());

    let outcome = unit.remove_component(&handle).unwrap();
    unit.tick(0.1).unwrap();
    unit.tick(0.1).unwrap();

    assert_eq!(outcome, RemoveOutcome::Removed);
    assert_eq!(x.borrow().updates, 1);
    assert!(x.borrow().owner().is_none());
    assert!(!unit.contains(&handle));
    assert!(!unit.is_scheduled(&handle));
    assert_eq!(unit.component_state(&handle), ComponentState::Detached);
    assert_eq!(count(&events, "x:detach"), 1);
}

#[test]
fn test_remove_unregistered_is_left_alone_by_default() {
    let events = events();
    let unit = Unit::new("strict-remove");
    let stranger = ComponentRef::new(Probe::<KindA>::new("stranger", &events));

    let outcome = unit.remove_component(&stranger).unwrap();

    assert_eq!(outcome, RemoveOutcome::NotRegistered);
    assert_eq!(count(&events, "stranger:detach"), 0);
}

#[test]
fn test_remove_unregistered_detaches_when_configured() {
    let events = events();
    let config = UnitConfig {
        detach_unregistered_on_remove: true,
        ..UnitConfig::default()
    };
    let unit = Unit::builder().config(config.clone()).build();
    let stranger = ComponentRef::new(Probe::<KindA>::new("stranger", &events));

    let outcome = unit.remove_component(&stranger).unwrap();

    assert_eq!(outcome, RemoveOutcome::DetachedUnregistered);
    assert_eq!(count(&events, "stranger:detach"), 1);

    // A component owned by another unit is never detached by this one
    let other = Unit::builder().name("other").config(config).build();
    let owned = ComponentRef::new(Probe::<KindB>::new("owned", &events));
    other.attach(owned.clone()).unwrap();

    let outcome = unit.remove_component(&owned).unwrap();

    assert_eq!(outcome, RemoveOutcome::NotRegistered);
    assert_eq!(count(&events, "owned:detach"), 0);
    assert!(owned.borrow().core().is_owned_by(&other));
}

#[test]
fn test_removed_type_can_be_added_again() {
    let events = events();
    let unit = Unit::new("reuse");
    let first = unit
        .add_component(Probe::<KindA>::new("first", &events))
        .unwrap();
    let key = first.outcome.key().unwrap();

    assert_eq!(unit.remove_by_key(key).unwrap(), RemoveOutcome::Removed);
    assert_eq!(unit.remove_by_key(key).unwrap(), RemoveOutcome::NotRegistered);

    let second = unit
        .add_component(Probe::<KindA>::new("second", &events))
        .unwrap();
    assert!(second.outcome.is_attached());
    assert_ne!(second.outcome.key(), Some(key));
}

#[test]
fn test_typed_and_predicate_lookup() {
    let events = events();
    let unit = Unit::new("lookup");
    let a = unit
        .add_component(Probe::<KindA>::new("a", &events))
        .unwrap()
        .component;
    let b = unit
        .add_component(Probe::<KindB>::new("b", &events).updatable())
        .unwrap()
        .component;
    unit.add_component(Probe::<KindC>::new("c", &events).updatable())
        .unwrap();

    let found = unit.get_component::<Probe<KindB>>().unwrap();
    assert!(std::rc::Rc::ptr_eq(&found, &b));
    assert!(unit.get_component::<super::support::SelfRemoving>().is_none());

    // First match in registration order wins
    let mut probe = |component: &dyn Component| component.is_enabled();
    let first_enabled = unit.find_component(&mut probe).unwrap();
    assert!(first_enabled.ptr_eq(&ComponentRef::from_rc(a.clone())));

    a.borrow_mut().disable();
    let first_enabled = unit.find_component(&mut probe).unwrap();
    assert!(first_enabled.ptr_eq(&ComponentRef::from_rc(b)));

    assert!(unit
        .find_component(|component| component.category() == Category::HostManaged)
        .is_none());
}

#[test]
fn test_component_state_progression() {
    let events = events();
    let unit = Unit::new("shadow");
    let handle = ComponentRef::new(Probe::<KindA>::new("a", &events));

    assert_eq!(unit.component_state(&handle), ComponentState::Detached);
    unit.attach(handle.clone()).unwrap();
    assert_eq!(unit.component_state(&handle), ComponentState::Attached);
    unit.initialize().unwrap();
    assert_eq!(unit.component_state(&handle), ComponentState::Initialized);

    handle.borrow_mut().disable();
    assert_eq!(unit.component_state(&handle), ComponentState::Initialized);

    unit.remove_component(&handle).unwrap();
    assert_eq!(unit.component_state(&handle), ComponentState::Detached);
}

#[test]
fn test_schedule_follows_registration_order() {
    let events = events();
    let unit = Unit::new("schedule");
    unit.add_component(Probe::<KindC>::new("c", &events).updatable())
        .unwrap();
    unit.add_component(Probe::<KindA>::new("a", &events)).unwrap();
    unit.add_component(Probe::<KindB>::new("b", &events).updatable())
        .unwrap();
    unit.initialize().unwrap();
    events.borrow_mut().clear();

    unit.tick(0.1).unwrap();

    assert_eq!(*events.borrow(), vec!["c:update", "b:update"]);
    let scheduled: Vec<_> = unit.scheduled().iter().map(ComponentRef::type_name).collect();
    assert_eq!(
        scheduled,
        vec![
            std::any::type_name::<Probe<KindC>>(),
            std::any::type_name::<Probe<KindB>>(),
        ]
    );
}

#[test]
fn test_diagnostic_journal_respects_capacity() {
    let events = events();
    let unit = Unit::builder()
        .config(UnitConfig {
            diagnostic_capacity: 0,
            ..UnitConfig::default()
        })
        .build();
    unit.add_component(Probe::<KindA>::new("a", &events)).unwrap();

    let rejected = unit
        .add_component(Probe::<KindA>::new("again", &events))
        .unwrap();

    assert!(!rejected.outcome.is_attached());
    assert!(unit.diagnostics().is_empty());
}

#[test]
fn test_clear_diagnostics() {
    let events = events();
    let unit = Unit::new("clear");
    unit.add_component(Probe::<KindA>::new("a", &events)).unwrap();
    unit.add_component(Probe::<KindA>::new("again", &events))
        .unwrap();
    assert_eq!(unit.diagnostics().len(), 1);

    unit.clear_diagnostics();

    assert!(unit.diagnostics().is_empty());
}
