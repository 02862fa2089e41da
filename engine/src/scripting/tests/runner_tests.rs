//! Multi-entity runner bookkeeping, readiness and notifications

use super::support::{enters, library, ListProps, RecordingFactory, KEY};
use crate::scripting::coordinator::CoordinatorState::{Pending, Settled};
use crate::scripting::error::ScriptSetIssue;
use crate::scripting::resolver::Readiness;
use crate::scripting::resource::{ScriptKind, ScriptResource};
use crate::scripting::runner::{MultiEntityRunner, RunnerEvent, ScriptContext};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_unknown_entity_has_no_state() {
    let entity = hecs::World::new().spawn(());
    let runner = MultiEntityRunner::new(KEY);
    assert_eq!(runner.get_state(entity), None);
    assert!(!runner.is_bound(entity));
    assert!(runner.all_settled());
}

#[test]
fn test_double_add_is_rejected() {
    let entity = hecs::World::new().spawn(());
    let mut props = ListProps::default();
    props.set(entity, &["B0"]);
    let library = library(&["B0"]);
    let mut factory = RecordingFactory::new();
    let mut runner = MultiEntityRunner::new(KEY);

    let mut ctx = ScriptContext::new(&props, &library, &mut factory);
    assert!(runner.add_entity(entity, Readiness::Ready, &mut ctx));
    assert!(!runner.add_entity(entity, Readiness::Ready, &mut ctx));
    drop(ctx);

    assert_eq!(factory.entered(), enters(&["B0"]));
    assert_eq!(runner.entity_count(), 1);
}

#[test]
fn test_entity_without_scripts_settles_with_empty_change() {
    let entity = hecs::World::new().spawn(());
    let props = ListProps::default();
    let library = library(&[]);
    let mut factory = RecordingFactory::new();
    let mut runner = MultiEntityRunner::new(KEY);

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    runner.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    runner.add_entity(
        entity,
        Readiness::Ready,
        &mut ScriptContext::new(&props, &library, &mut factory),
    );

    let events = events.borrow();
    assert_eq!(events.len(), 2);
    match &events[0] {
        RunnerEvent::Changed(changed) => {
            assert!(changed.old.is_empty());
            assert!(changed.new.is_empty());
        }
        other => panic!("expected a change, got {other:?}"),
    }
    assert_eq!(events[1], RunnerEvent::Settled { entity });
    assert_eq!(runner.get_state(entity), Some(Settled));
}

#[test]
fn test_deferred_entity_waits_for_ready() {
    let entity = hecs::World::new().spawn(());
    let mut props = ListProps::default();
    props.set(entity, &["B0"]);
    let library = library(&["B0"]);
    let mut factory = RecordingFactory::new();
    let mut runner = MultiEntityRunner::new(KEY);

    runner.add_entity(
        entity,
        Readiness::Deferred,
        &mut ScriptContext::new(&props, &library, &mut factory),
    );
    runner.update(&mut ScriptContext::new(&props, &library, &mut factory));
    assert_eq!(runner.get_state(entity), Some(Pending));
    assert!(factory.calls().is_empty());

    runner.signal_ready(entity, &mut ScriptContext::new(&props, &library, &mut factory));
    assert_eq!(runner.get_state(entity), Some(Settled));
    assert_eq!(factory.entered(), enters(&["B0"]));
}

#[test]
fn test_entities_settle_independently() {
    let mut world = hecs::World::new();
    let slow = world.spawn(());
    let fast = world.spawn(());
    let mut props = ListProps::default();
    props.set(slow, &["V0", "B0"]);
    props.set(fast, &["B1"]);
    let library = library(&["B0", "B1", "V0"]);
    let mut factory = RecordingFactory::new();
    let mut runner = MultiEntityRunner::new(KEY);

    for entity in [slow, fast] {
        runner.add_entity(
            entity,
            Readiness::Ready,
            &mut ScriptContext::new(&props, &library, &mut factory),
        );
    }

    assert_eq!(runner.get_state(slow), Some(Pending));
    assert_eq!(runner.get_state(fast), Some(Settled));
    assert!(!runner.all_settled());

    factory.complete(slow, "V0");
    runner.pump_completions();
    assert!(runner.all_settled());
}

#[test]
fn test_unresolvable_reference_resolves_after_insert() {
    let entity = hecs::World::new().spawn(());
    let mut props = ListProps::default();
    props.set(entity, &["B0", "late"]);
    let mut library = library(&["B0"]);
    let mut factory = RecordingFactory::new();
    let mut runner = MultiEntityRunner::new(KEY);

    runner.add_entity(
        entity,
        Readiness::Ready,
        &mut ScriptContext::new(&props, &library, &mut factory),
    );
    assert_eq!(runner.resolved_set(entity).unwrap().ids(), vec!["B0"]);
    assert!(runner.take_diagnostics().iter().any(|issue| matches!(
        issue,
        ScriptSetIssue::UnresolvableReference { id, .. } if id == "late"
    )));

    library.insert(ScriptResource::new("late", ScriptKind::Imperative, ""));
    for id in library.drain_updates() {
        runner.notify_resource_updated(&id);
    }
    runner.update(&mut ScriptContext::new(&props, &library, &mut factory));

    assert_eq!(runner.resolved_set(entity).unwrap().ids(), vec!["B0", "late"]);
    assert_eq!(runner.get_state(entity), Some(Settled));
}

#[test]
fn test_settled_event_follows_last_completion() {
    let entity = hecs::World::new().spawn(());
    let mut props = ListProps::default();
    props.set(entity, &["V0", "V1"]);
    let library = library(&["V0", "V1"]);
    let mut factory = RecordingFactory::new();
    let mut runner = MultiEntityRunner::new(KEY);

    let settled = Rc::new(RefCell::new(0));
    let counter = settled.clone();
    runner.subscribe(move |event| {
        if matches!(event, RunnerEvent::Settled { .. }) {
            *counter.borrow_mut() += 1;
        }
    });

    runner.add_entity(
        entity,
        Readiness::Ready,
        &mut ScriptContext::new(&props, &library, &mut factory),
    );
    factory.complete(entity, "V0");
    runner.pump_completions();
    assert_eq!(*settled.borrow(), 0);

    factory.complete(entity, "V1");
    runner.pump_completions();
    assert_eq!(*settled.borrow(), 1);
}

#[test]
fn test_clear_unbinds_everything() {
    let mut world = hecs::World::new();
    let a = world.spawn(());
    let b = world.spawn(());
    let mut props = ListProps::default();
    props.set(a, &["B0"]);
    props.set(b, &["V0"]);
    let library = library(&["B0", "V0"]);
    let mut factory = RecordingFactory::new();
    let mut runner = MultiEntityRunner::new(KEY);

    for entity in [a, b] {
        runner.add_entity(
            entity,
            Readiness::Ready,
            &mut ScriptContext::new(&props, &library, &mut factory),
        );
    }
    runner.clear();

    assert_eq!(runner.entity_count(), 0);
    assert!(!factory.has_pending(a, "B0"));
    assert!(factory.has_pending(b, "V0"));
    factory.complete(b, "V0");
    runner.pump_completions();
    assert_eq!(factory.entered(), enters(&["B0"]));
}
