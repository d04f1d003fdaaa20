//! # Event Bus Properties
//!
//! Checks the bus against a straightforward model under randomized sequences
//! of `emit`, `on` and `off`, plus the fixed scenarios for eviction, fault
//! isolation and idempotent removal.
//!
//! ## Properties
//!
//! 1. **State coherence**: current state of an event is the payload of its last emit
//! 2. **Bounded history**: the log holds the newest `max_history_size` records, oldest first
//! 3. **Delivery isolation**: a faulting subscriber never stops its siblings
//! 4. **Idempotent removal**: removing twice equals removing once
//! 5. **Registry pruning**: an event with no subscribers has no registry key

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};

    use mf_event_bus::{
        BusConfig, Callback, DeliveryOutcome, EventBus, LogEntry, LogKind, Payload,
    };
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const EVENTS: [&str; 3] = ["a", "b", "c"];
    const MODULES: [&str; 3] = ["m1", "m2", "m3"];
    const SOURCE: &str = "src";

    fn bus_with_history(max_history_size: usize) -> EventBus {
        EventBus::new(BusConfig::with_history_size(max_history_size).unwrap())
    }

    /// Callbacks that count their own invocations.
    struct CallbackPool {
        callbacks: Vec<Callback>,
        calls: Vec<Arc<AtomicUsize>>,
    }

    impl CallbackPool {
        fn new(size: usize) -> Self {
            let calls: Vec<Arc<AtomicUsize>> =
                (0..size).map(|_| Arc::new(AtomicUsize::new(0))).collect();
            let callbacks = calls
                .iter()
                .map(|counter| {
                    let counter = Arc::clone(counter);
                    Callback::infallible(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                })
                .collect();
            Self { callbacks, calls }
        }

        fn calls(&self, index: usize) -> usize {
            self.calls[index].load(Ordering::SeqCst)
        }
    }

    /// Reference model of the bus.
    #[derive(Default)]
    struct Model {
        max_history_size: usize,
        log: Vec<(LogKind, String, String)>,
        state: HashMap<String, Payload>,
        subscribers: HashMap<String, Vec<(usize, String)>>,
        calls: HashMap<usize, usize>,
    }

    impl Model {
        fn new(max_history_size: usize) -> Self {
            Self {
                max_history_size,
                ..Self::default()
            }
        }

        fn emit(&mut self, event: &str, payload: Payload) {
            self.state.insert(event.to_string(), payload);
            self.log
                .push((LogKind::Emit, event.to_string(), SOURCE.to_string()));
            for (callback, module) in self.subscribers.get(event).cloned().unwrap_or_default() {
                *self.calls.entry(callback).or_default() += 1;
                self.log.push((LogKind::Handled, event.to_string(), module));
            }
        }

        fn on(&mut self, event: &str, callback: usize, module: &str) {
            self.log
                .push((LogKind::Subscribe, event.to_string(), module.to_string()));
            self.subscribers
                .entry(event.to_string())
                .or_default()
                .push((callback, module.to_string()));
        }

        fn off(&mut self, event: &str, callback: usize, module: &str) {
            let Some(list) = self.subscribers.get_mut(event) else {
                return;
            };
            let Some(index) = list.iter().position(|(c, m)| *c == callback && m == module) else {
                return;
            };
            list.remove(index);
            if list.is_empty() {
                self.subscribers.remove(event);
            }
            self.log
                .push((LogKind::Unsubscribe, event.to_string(), module.to_string()));
        }

        fn expected_history(&self) -> &[(LogKind, String, String)] {
            let start = self.log.len().saturating_sub(self.max_history_size);
            &self.log[start..]
        }

        fn modules(&self) -> BTreeSet<String> {
            self.subscribers
                .values()
                .flatten()
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    fn shape(history: &[LogEntry]) -> Vec<(LogKind, String, String)> {
        history
            .iter()
            .map(|e| (e.kind, e.event.clone(), e.module_id.clone()))
            .collect()
    }

    fn assert_matches_model(bus: &EventBus, model: &Model, step: usize) {
        let history = bus.get_event_history(None);
        assert!(history.len() <= model.max_history_size, "step {step}: log over bound");
        assert_eq!(
            shape(&history),
            model.expected_history(),
            "step {step}: history diverged"
        );

        for event in EVENTS {
            assert_eq!(
                bus.get_current_state(event),
                model.state.get(event).cloned(),
                "step {step}: state of {event}"
            );
            assert_eq!(
                bus.has_listeners(event),
                model.subscribers.contains_key(event),
                "step {step}: registry key for {event}"
            );
        }
        assert_eq!(bus.get_subscribers(None), model.modules(), "step {step}");
    }

    // =============================================================================
    // RANDOMIZED SEQUENCES
    // =============================================================================

    fn run_random_sequence(seed: u64, max_history_size: usize, steps: usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let bus = bus_with_history(max_history_size);
        let pool = CallbackPool::new(4);
        let mut model = Model::new(max_history_size);

        for step in 0..steps {
            let event = EVENTS[rng.gen_range(0..EVENTS.len())];
            let module = MODULES[rng.gen_range(0..MODULES.len())];
            let callback = rng.gen_range(0..pool.callbacks.len());

            match rng.gen_range(0..10) {
                0..=4 => {
                    let payload = json!({ "step": step, "value": rng.gen::<u32>() });
                    bus.emit(event, payload.clone(), Some(SOURCE)).unwrap();
                    model.emit(event, payload);
                }
                5..=7 => {
                    bus.on(event, pool.callbacks[callback].clone(), module).unwrap();
                    model.on(event, callback, module);
                }
                _ => {
                    bus.off(event, &pool.callbacks[callback], module).unwrap();
                    model.off(event, callback, module);
                }
            }

            assert_matches_model(&bus, &model, step);
        }

        for index in 0..pool.callbacks.len() {
            assert_eq!(
                pool.calls(index),
                model.calls.get(&index).copied().unwrap_or(0),
                "invocations of callback {index}"
            );
        }
    }

    #[test]
    fn test_random_sequences_match_model() {
        for seed in 0..16 {
            run_random_sequence(seed, 10, 300);
        }
    }

    #[test]
    fn test_random_sequences_with_tiny_history() {
        for seed in 100..108 {
            run_random_sequence(seed, 1, 200);
            run_random_sequence(seed, 3, 200);
        }
    }

    // =============================================================================
    // FIXED SCENARIOS
    // =============================================================================

    /// Bound of three: the oldest emit is evicted.
    #[test]
    fn test_history_evicts_oldest_first() {
        let bus = bus_with_history(3);

        bus.emit("a", json!(1), None).unwrap();
        bus.emit("a", json!(2), None).unwrap();
        bus.emit("b", json!(3), None).unwrap();
        bus.emit("a", json!(4), None).unwrap();

        let history = bus.get_event_history(None);
        let summary: Vec<(LogKind, &str, Option<Payload>)> = history
            .iter()
            .map(|e| (e.kind, e.event.as_str(), e.payload.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (LogKind::Emit, "a", Some(json!(2))),
                (LogKind::Emit, "b", Some(json!(3))),
                (LogKind::Emit, "a", Some(json!(4))),
            ]
        );
        assert_eq!(bus.get_current_state("a"), Some(json!(4)));
        assert_eq!(bus.get_current_state("b"), Some(json!(3)));
    }

    /// A failing subscriber does not prevent delivery to the next one.
    #[test]
    fn test_faulting_subscriber_does_not_block_next() {
        let bus = bus_with_history(100);
        let calls = Arc::new(AtomicUsize::new(0));

        bus.on("x", Callback::new(|_| anyhow::bail!("boom")), "m1").unwrap();
        let counter = Arc::clone(&calls);
        bus.on(
            "x",
            Callback::infallible(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            "m2",
        )
        .unwrap();
        bus.clear_history();

        bus.emit("x", Payload::Null, None).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let history = bus.get_event_history(None);
        assert_eq!(
            shape(&history),
            vec![
                (LogKind::Emit, "x".to_string(), "unknown".to_string()),
                (LogKind::Handled, "x".to_string(), "m2".to_string()),
            ]
        );
    }

    /// Subscribe, unsubscribe, unsubscribe again.
    #[test]
    fn test_double_unsubscribe_is_noop() {
        let bus = bus_with_history(100);
        let callback = Callback::infallible(|_| {});

        bus.on("x", callback.clone(), "m1").unwrap();
        bus.off("x", &callback, "m1").unwrap();
        let after_first = bus.get_event_history(None);
        bus.off("x", &callback, "m1").unwrap();

        assert!(bus.get_subscribers(Some("x")).is_empty());
        assert!(!bus.has_listeners("x"));
        assert_eq!(bus.get_event_history(None), after_first);
    }

    #[test]
    fn test_isolation_with_error_and_panic() {
        let bus = bus_with_history(100);
        let pool = CallbackPool::new(2);

        bus.on("x", pool.callbacks[0].clone(), "first").unwrap();
        bus.on("x", Callback::new(|_| anyhow::bail!("rejected")), "second").unwrap();
        bus.on("x", Callback::infallible(|_| panic!("crashed")), "third").unwrap();
        bus.on("x", pool.callbacks[1].clone(), "fourth").unwrap();

        let report = bus.emit_with_report("x", json!("go"), Some(SOURCE)).unwrap();

        assert_eq!(pool.calls(0), 1);
        assert_eq!(pool.calls(1), 1);
        assert_eq!(report.handled_count(), 2);
        assert_eq!(report.fault_count(), 2);
        assert!(matches!(
            &report.outcomes[1],
            DeliveryOutcome::Faulted { module_id, reason }
                if module_id == "second" && reason.contains("rejected")
        ));
        assert!(matches!(
            &report.outcomes[2],
            DeliveryOutcome::Faulted { module_id, reason }
                if module_id == "third" && reason.contains("crashed")
        ));

        let handled: Vec<String> = bus
            .get_event_history(Some("x"))
            .into_iter()
            .filter(|e| e.kind == LogKind::Handled)
            .map(|e| e.module_id)
            .collect();
        assert_eq!(handled, vec!["first", "fourth"]);

        // The bus keeps working after a panic inside a callback.
        bus.emit("x", json!("again"), Some(SOURCE)).unwrap();
        assert_eq!(pool.calls(0), 2);
    }

    /// A subscription removed by an earlier callback in the same pass is still
    /// delivered for that pass, and only that pass.
    #[test]
    fn test_removal_during_emit_applies_to_next_pass() {
        let bus = Arc::new(bus_with_history(100));
        let pool = CallbackPool::new(1);
        let victim = pool.callbacks[0].clone();

        let weak: Weak<EventBus> = Arc::downgrade(&bus);
        let target = victim.clone();
        let remover = Callback::infallible(move |_| {
            if let Some(bus) = weak.upgrade() {
                bus.off("x", &target, "victim").unwrap();
            }
        });

        bus.on("x", remover, "remover").unwrap();
        bus.on("x", victim, "victim").unwrap();

        bus.emit("x", json!(1), None).unwrap();
        assert_eq!(pool.calls(0), 1);
        assert_eq!(
            bus.get_subscribers(Some("x")),
            BTreeSet::from(["remover".to_string()])
        );

        bus.emit("x", json!(2), None).unwrap();
        assert_eq!(pool.calls(0), 1);
    }

    /// A callback that emits sees the nested emission complete before it returns.
    #[test]
    fn test_nested_emit_completes_before_outer_returns() {
        let bus = Arc::new(bus_with_history(100));
        let observed = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&bus);
        let seen = Arc::clone(&observed);
        bus.on(
            "outer",
            Callback::new(move |payload| {
                let bus = weak
                    .upgrade()
                    .ok_or_else(|| anyhow::anyhow!("bus dropped"))?;
                bus.emit("inner", payload.clone(), Some("relay"))?;
                *seen.lock() = bus.get_current_state("inner");
                Ok(())
            }),
            "relay",
        )
        .unwrap();

        bus.emit("outer", json!({ "n": 1 }), Some(SOURCE)).unwrap();

        assert_eq!(*observed.lock(), Some(json!({ "n": 1 })));
        let kinds: Vec<(LogKind, String)> = bus
            .get_event_history(None)
            .into_iter()
            .skip(1)
            .map(|e| (e.kind, e.event))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (LogKind::Emit, "outer".to_string()),
                (LogKind::Emit, "inner".to_string()),
                (LogKind::Handled, "outer".to_string()),
            ]
        );
    }

    #[test]
    fn test_concurrent_emitters_keep_bound() {
        let bus = Arc::new(bus_with_history(50));
        let pool = CallbackPool::new(1);
        bus.on("tick", pool.callbacks[0].clone(), "counter").unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let bus = Arc::clone(&bus);
                scope.spawn(move || {
                    for i in 0..100 {
                        bus.emit("tick", json!({ "worker": worker, "i": i }), None)
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(bus.events_published(), 400);
        assert_eq!(pool.calls(0), 400);
        assert_eq!(bus.get_event_history(None).len(), 50);
        assert!(bus.get_current_state("tick").is_some());
    }
}
