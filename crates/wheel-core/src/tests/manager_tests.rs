use super::*;
use crate::config::DEFAULT_WIDTH;
use crate::dependency::FnStrategy;
use crate::error::ComputeError;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct RecordingScheduler {
    frames: AtomicUsize,
}

impl RecordingScheduler {
    fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl WheelScheduler for RecordingScheduler {
    fn schedule_frame(&self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

fn date_slots() -> Vec<SlotConfig> {
    vec![
        SlotConfig::new(31, 30)
            .with_stable_id("day")
            .with_dependency(DependencySpec::days_in_month(1, 2, 2000)),
        SlotConfig::new(12, 0).with_stable_id("month"),
        SlotConfig::new(50, 24).with_stable_id("year"),
    ]
}

fn linked(depends_on: usize, item_count: impl Fn(usize) -> usize + 'static) -> DependencySpec {
    DependencySpec::from_fn(vec![depends_on], move |values| Ok(item_count(values[0])))
}

fn manager_with(slots: Vec<SlotConfig>) -> WheelManager {
    let mut manager = WheelManager::default();
    manager.initialize(slots).expect("valid slots");
    manager
}

#[test]
fn date_chain_follows_month_and_leap_year() {
    let mut manager = manager_with(date_slots());
    assert_eq!(manager.selections(), &[30, 0, 24]);

    assert!(manager.update_selection(1, 1));
    assert_eq!(manager.configs()[0].item_count, 29);
    assert_eq!(manager.selections()[0], 28);

    assert!(manager.update_selection(2, 23));
    assert_eq!(manager.configs()[0].item_count, 28);
    assert_eq!(manager.selections()[0], 27);
    assert!(manager.validate_consistency());
}

#[test]
fn cascade_sees_upstream_recreation() {
    let upstream = DependencySpec::new(
        vec![2],
        FnStrategy::new(|values| Ok(values[0] + 5)).with_initial_index(|_, _, count| Ok(count - 1)),
    );
    let mut manager = manager_with(vec![
        SlotConfig::new(5, 0).with_dependency(linked(1, |value| value + 1)),
        SlotConfig::new(5, 4).with_dependency(upstream),
        SlotConfig::new(10, 0),
    ]);

    assert!(manager.update_selection(2, 3));
    assert_eq!(manager.configs()[1].item_count, 8);
    assert_eq!(manager.selections()[1], 7);
    // 4 + 1 would mean slot 0 read slot 1 before it was rebuilt.
    assert_eq!(manager.configs()[0].item_count, 8);
}

#[test]
fn repeated_selection_cascades_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let spec = DependencySpec::from_fn(vec![1], move |values| {
        counter.set(counter.get() + 1);
        Ok(values[0] + 1)
    });
    let mut manager = manager_with(vec![
        SlotConfig::new(1, 0).with_dependency(spec),
        SlotConfig::new(10, 0),
    ]);

    assert!(manager.update_selection(1, 3));
    assert_eq!(calls.get(), 1);
    assert!(!manager.update_selection(1, 3));
    assert_eq!(calls.get(), 1);
    assert_eq!(manager.configs()[0].item_count, 4);
}

#[test]
fn failing_dependent_does_not_block_siblings() {
    let mut manager = manager_with(vec![
        SlotConfig::new(3, 0).with_dependency(DependencySpec::from_fn(vec![2], |_| {
            Err(ComputeError::new("offline"))
        })),
        SlotConfig::new(3, 0).with_dependency(linked(2, |value| value + 2)),
        SlotConfig::new(10, 0),
    ]);

    assert!(manager.update_selection(2, 4));
    assert_eq!(manager.configs()[0].item_count, 3);
    assert_eq!(manager.configs()[1].item_count, 6);
}

fn restyled_month() -> SlotConfig {
    SlotConfig::new(12, 5)
        .with_stable_id("month")
        .with_width(99.0)
        .with_formatter(|index| format!("M{}", index + 1))
}

#[test]
fn recreate_without_structural_change_is_noop() {
    let mut manager = manager_with(vec![SlotConfig::new(12, 0).with_stable_id("month")]);
    let handle = manager.handle(0).unwrap();
    let revision = manager.revision();

    assert!(!manager.recreate(0, restyled_month()));
    assert_eq!(manager.recreate_many(&[0], vec![restyled_month()]), Ok(0));

    assert!(manager.handle(0).unwrap().ptr_eq(&handle));
    assert_eq!(manager.revision(), revision);
    let config = &manager.configs()[0];
    assert_eq!(config.width, DEFAULT_WIDTH);
    assert_eq!(config.initial_index, 0);
    assert_eq!(config.label(0), "0");
    assert_eq!(manager.selections()[0], 0);
    assert_eq!(manager.handle_stats().allocated, 1);
}

#[test]
fn identity_change_recreates() {
    let mut manager = manager_with(vec![SlotConfig::new(12, 0).with_stable_id("month")]);
    let handle = manager.handle(0).unwrap();
    assert!(manager.recreate(0, SlotConfig::new(12, 3).with_stable_id("quarter")));
    assert!(!manager.handle(0).unwrap().ptr_eq(&handle));
    assert_eq!(manager.selections()[0], 3);
    assert_eq!(manager.state(0).unwrap().id, "quarter");
}

#[test]
fn recreate_rejects_bad_input() {
    let mut manager = manager_with(vec![SlotConfig::new(12, 0)]);
    assert!(!manager.recreate(4, SlotConfig::new(3, 0)));
    assert!(!manager.recreate(0, SlotConfig::new(0, 0)));
    assert_eq!(manager.configs()[0].item_count, 12);
}

#[test]
fn recreate_reregisters_changed_dependency() {
    let mut manager = manager_with(vec![
        SlotConfig::new(3, 0).with_dependency(linked(1, |value| value + 1)),
        SlotConfig::new(10, 0),
        SlotConfig::new(10, 0),
    ]);
    let moved = SlotConfig::new(4, 0).with_dependency(linked(2, |value| value + 1));
    assert!(manager.recreate(0, moved));
    assert!(!manager.graph().has_dependents(1));
    assert!(manager.graph().has_dependents(2));

    let cyclic = SlotConfig::new(10, 0).with_dependency(linked(0, |value| value + 1));
    assert!(manager.recreate(2, SlotConfig::new(9, 0)));
    manager.recreate(2, cyclic);
    assert!(!manager.graph().has_dependency(2));
    assert!(manager.configs()[2].dependency.is_none());
}

#[test]
fn pool_bounds_fresh_allocations() {
    let mut manager = manager_with(vec![SlotConfig::new(10, 0)]);
    for round in 1..=30 {
        let config = SlotConfig::new(10 + round % 2, round % 3);
        assert!(manager.recreate(0, config));
    }
    let stats = manager.handle_stats();
    assert!(stats.allocated <= DEFAULT_POOL_CAPACITY + 3, "{stats:?}");
    assert!(stats.reused > 0);
    assert!(manager.pooled_handles() <= DEFAULT_POOL_CAPACITY);
}

#[test]
fn trim_pool_disposes_excess() {
    let mut manager = manager_with(vec![SlotConfig::new(10, 9)]);
    for round in 0..8 {
        manager.recreate(0, SlotConfig::new(20 + round, round));
    }
    assert_eq!(manager.pooled_handles(), 8);
    assert_eq!(manager.trim_pool(), 3);
    assert_eq!(manager.pooled_handles(), DEFAULT_POOL_CAPACITY / 2);
}

#[test]
fn attached_handle_disposal_waits_for_detach() {
    let scheduler = Arc::new(RecordingScheduler::default());
    let mut manager = WheelManager::with_scheduler(ManagerOptions::default(), scheduler.clone());
    manager
        .initialize(vec![
            SlotConfig::new(5, 0),
            SlotConfig::new(3, 0).with_dependency(linked(0, |value| value + 3)),
        ])
        .unwrap();

    let view = manager.handle(1).unwrap();
    assert!(view.attach());
    assert!(manager.update_selection(0, 2));
    assert_eq!(manager.configs()[1].item_count, 5);
    assert_eq!(manager.pending_disposals(), 1);
    assert_eq!(manager.handle_stats().deferred, 1);
    assert!(!view.is_disposed());
    assert!(scheduler.frames() >= 1);

    manager.on_frame();
    assert_eq!(manager.pending_disposals(), 1);

    view.detach();
    manager.on_frame();
    assert_eq!(manager.pending_disposals(), 0);
    assert_eq!(manager.pooled_handles(), 1);
    assert!(!view.is_disposed());

    assert!(manager.update_selection(0, 4));
    assert!(manager.handle(1).unwrap().ptr_eq(&view));
}

#[test]
fn selection_moved_by_recreation_notifies_on_frame() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut manager = manager_with(vec![
        SlotConfig::new(5, 4),
        SlotConfig::new(3, 2)
            .with_dependency(linked(0, |value| value + 1))
            .with_on_change(move |value| sink.borrow_mut().push(value)),
    ]);

    assert!(manager.update_selection(0, 1));
    assert_eq!(manager.selections()[1], 1);
    assert!(seen.borrow().is_empty());
    manager.on_frame();
    assert_eq!(*seen.borrow(), vec![1]);
}

#[test]
fn reinitialize_drops_notifications_of_old_slots() {
    let fired = Rc::new(Cell::new(0));
    let counter = Rc::clone(&fired);
    let mut manager = manager_with(vec![
        SlotConfig::new(5, 4),
        SlotConfig::new(3, 2)
            .with_dependency(linked(0, |value| value + 1))
            .with_on_change(move |_| counter.set(counter.get() + 1)),
    ]);

    assert!(manager.update_selection(0, 1));
    manager.initialize(vec![SlotConfig::new(3, 0)]).unwrap();
    manager.on_frame();
    assert_eq!(fired.get(), 0);
}

#[test]
fn position_only_skips_cascade_for_leaves() {
    let mut manager = manager_with(vec![
        SlotConfig::new(10, 0),
        SlotConfig::new(10, 0).with_dependency(linked(0, |value| value + 1)),
    ]);

    assert!(manager.update_position_only(1, 5, true));
    let handle = manager.handle(1).unwrap();
    assert_eq!(handle.position(), 0);
    assert_eq!(handle.animation_target(), Some(5));
    manager.on_frame();
    assert_eq!(handle.position(), 5);
    assert!(!manager.update_position_only(1, 5, false));

    assert!(manager.update_position_only(0, 3, false));
    assert_eq!(manager.configs()[1].item_count, 4);
    assert_eq!(manager.selections()[1], 3);
    assert_eq!(manager.handle(0).unwrap().position(), 3);
}

#[test]
fn batch_positions_emit_one_change() {
    let mut manager = manager_with(date_slots());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    manager.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    assert_eq!(manager.update_positions_many(&[(1, 1), (2, 23), (7, 0)], false), 2);
    assert_eq!(manager.configs()[0].item_count, 28);
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].slots, vec![0, 1, 2]);
}

#[test]
fn recreate_many_swaps_handles_in_one_pass() {
    let mut manager = manager_with(vec![SlotConfig::new(10, 1), SlotConfig::new(10, 2)]);
    let first = manager.handle(0).unwrap();
    let second = manager.handle(1).unwrap();

    let recreated = manager
        .recreate_many(&[0, 1], vec![SlotConfig::new(11, 2), SlotConfig::new(11, 1)])
        .unwrap();
    assert_eq!(recreated, 2);
    assert!(manager.handle(0).unwrap().ptr_eq(&second));
    assert!(manager.handle(1).unwrap().ptr_eq(&first));
    assert_eq!(manager.handle_stats().allocated, 2);
    assert_eq!(manager.selections(), &[2, 1]);
}

#[test]
fn recreate_many_requires_matching_lengths() {
    let mut manager = manager_with(vec![SlotConfig::new(10, 1)]);
    assert_eq!(
        manager.recreate_many(&[0], Vec::new()),
        Err(WheelError::LengthMismatch {
            indices: 1,
            configs: 0
        })
    );
}

#[test]
fn manager_registration_rejects_cycles() {
    let mut manager = manager_with(vec![SlotConfig::new(5, 0), SlotConfig::new(5, 0)]);
    manager
        .register_dependency(0, linked(1, |value| value + 1), None)
        .unwrap();
    assert!(manager.configs()[0].dependency.is_some());

    let err = manager
        .register_dependency(1, linked(0, |value| value + 1), None)
        .unwrap_err();
    assert_eq!(err, ConfigError::CycleDetected { slot: 1, via: 0 });
    assert!(!manager.graph().has_dependency(1));
    assert!(manager.configs()[1].dependency.is_none());

    let empty = DependencySpec::from_fn(Vec::new(), |_| Ok(1));
    assert_eq!(
        manager.register_dependency(1, empty, None),
        Err(ConfigError::EmptyDependencies)
    );
    assert!(!manager.graph().has_dependency(1));

    manager.unregister_dependency(0);
    assert!(manager.dependents_of(1).is_empty());
    assert!(manager.configs()[0].dependency.is_none());
}

#[test]
fn manager_registration_rejects_slot_past_end() {
    let mut manager = manager_with(vec![SlotConfig::new(5, 0), SlotConfig::new(5, 0)]);
    assert_eq!(
        manager.register_dependency(7, linked(0, |value| value + 1), None),
        Err(ConfigError::DependencyOutOfRange { index: 7, total: 2 })
    );
    assert!(manager.graph().is_empty());
    assert!(manager.validate_graph());
}

#[test]
fn initialize_leaves_refused_dependency_independent() {
    let mut manager = manager_with(vec![
        SlotConfig::new(5, 0).with_dependency(linked(1, |value| value + 1)),
        SlotConfig::new(5, 0).with_dependency(linked(0, |value| value + 1)),
    ]);
    assert!(manager.graph().has_dependency(0));
    assert!(!manager.graph().has_dependency(1));
    assert!(manager.configs()[1].dependency.is_none());
    assert!(manager.validate_graph());
}

#[test]
fn initialize_rejects_invalid_shape_without_touching_state() {
    let mut manager = manager_with(date_slots());
    let err = manager
        .initialize(vec![SlotConfig::new(3, 0), SlotConfig::new(0, 0)])
        .unwrap_err();
    assert_eq!(err, ConfigError::InvalidItemCount);
    assert_eq!(manager.slot_count(), 3);
}

#[test]
fn bounds_errors_are_no_ops() {
    let mut manager = manager_with(date_slots());
    let revision = manager.revision();
    assert!(!manager.update_selection(5, 0));
    assert!(!manager.update_selection(1, 12));
    assert!(!manager.update_position_only(9, 0, true));
    assert_eq!(manager.revision(), revision);
    assert!(manager.state(9).is_none());
}

#[test]
fn repair_restores_consistency() {
    let mut manager = manager_with(date_slots());
    manager.corrupt_for_test(0, Some((1, 99)));
    assert!(!manager.validate_consistency());
    assert!(manager.repair_inconsistencies());
    assert_eq!(manager.slot_count(), 3);
    assert_eq!(manager.selections().len(), 3);
    assert_eq!(manager.selections()[1], 11);

    manager.dispose_handle_for_test(2);
    assert!(!manager.validate_consistency());
    assert!(manager.repair_inconsistencies());
    let handle = manager.handle(2).unwrap();
    assert!(!handle.is_disposed());
    assert_eq!(handle.position(), 24);
}

#[test]
fn repair_pools_surplus_handle() {
    let mut manager = manager_with(date_slots());
    let orphan = manager.push_orphan_handle_for_test();
    assert!(!manager.validate_consistency());

    assert!(manager.repair_inconsistencies());
    assert_eq!(manager.slot_count(), 3);
    assert_eq!(manager.selections().len(), 3);
    assert!(manager.handle(3).is_none());
    assert!(!orphan.is_disposed());
    assert_eq!(manager.pooled_handles(), 1);
}

#[test]
fn repair_disposes_surplus_handle_when_pool_is_full() {
    let mut manager = WheelManager::new(ManagerOptions {
        pool_capacity: 0,
        ..ManagerOptions::default()
    });
    manager.initialize(date_slots()).unwrap();
    let orphan = manager.push_orphan_handle_for_test();

    assert!(manager.repair_inconsistencies());
    assert_eq!(manager.slot_count(), 3);
    assert!(orphan.is_disposed());
    assert_eq!(manager.pooled_handles(), 0);
    assert_eq!(manager.handle_stats().disposed, 1);
}

#[test]
fn releasing_pooled_handle_counts_once() {
    let mut manager = manager_with(vec![SlotConfig::new(10, 0)]);
    let old = manager.handle(0).unwrap();
    assert!(manager.recreate(0, SlotConfig::new(11, 3)));
    assert_eq!(manager.handle_stats().pooled, 1);

    manager.release_handle(old.clone());
    assert_eq!(manager.handle_stats().pooled, 1);
    assert_eq!(manager.pooled_handles(), 1);
    assert!(!old.is_disposed());
}

#[test]
fn listeners_receive_one_event_per_change() {
    let mut manager = manager_with(date_slots());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let id = manager.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    manager.update_selection(1, 1);
    manager.update_selection(1, 1);
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].slots, vec![0, 1]);
    assert_eq!(events.borrow()[0].revision, manager.revision());

    assert!(manager.unsubscribe(id));
    assert!(!manager.unsubscribe(id));
    manager.update_selection(1, 2);
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn state_snapshot_reports_identity() {
    let manager = manager_with(date_slots());
    let state = manager.state(1).unwrap();
    assert_eq!(state.id, "month");
    assert_eq!(state.key, SlotKey::from_identity("month"));
    assert_eq!(state.selection, 0);
    assert_eq!(state.config.item_count, 12);
}

#[test]
fn dispose_is_idempotent() {
    let mut manager = manager_with(date_slots());
    let handle = manager.handle(0).unwrap();
    manager.dispose();
    assert!(handle.is_disposed());
    assert!(manager.is_disposed());
    assert_eq!(manager.slot_count(), 0);
    assert!(manager.graph().is_empty());
    manager.dispose();
    assert!(!manager.update_selection(0, 1));

    manager.initialize(date_slots()).unwrap();
    assert!(!manager.is_disposed());
    assert_eq!(manager.slot_count(), 3);
}
