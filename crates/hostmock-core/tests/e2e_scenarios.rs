//! End-to-end scenarios composing channels and stores the way a mocked
//! namespace does.

use hostmock_core::{
    ChannelRegistry, EventChannel, ObservableStore, StoreValue, SubscriptionBag, Update, bridge,
    snapshot_by_clone,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn bounded_store_scenario() {
    let store = ObservableStore::with_capacity(json!({"count": 0}), 2);
    let pairs = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&pairs);
    store.subscribe(move |new: &Value, old: &Value| {
        sink.borrow_mut().push((new["count"].clone(), old["count"].clone()));
    });

    store.update(|_| json!({"count": 1}));
    store.update(|_| json!({"count": 2}));
    store.update(|_| json!({"count": 3}));

    assert_eq!(store.current(), json!({"count": 3}));
    let history: Vec<Value> = store.history().into_iter().map(|e| e.value["count"].clone()).collect();
    assert_eq!(history, vec![json!(2), json!(3)]);
    assert_eq!(
        *pairs.borrow(),
        vec![
            (json!(1), json!(0)),
            (json!(2), json!(1)),
            (json!(3), json!(2)),
        ]
    );
}

#[test]
fn reentrant_channel_scenario() {
    let channel: EventChannel<String> = EventChannel::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let o1 = Rc::clone(&order);
    let republish = channel.clone();
    channel
        .subscribe(move |p| {
            o1.borrow_mut().push(format!("L1({p})"));
            if p == "a" {
                republish.publish("b".to_string());
            }
        })
        .unwrap();
    let o2 = Rc::clone(&order);
    channel
        .subscribe(move |p| o2.borrow_mut().push(format!("L2({p})")))
        .unwrap();

    channel.publish("a".to_string());
    assert_eq!(*order.borrow(), vec!["L1(a)", "L2(a)", "L1(b)", "L2(b)"]);
}

#[derive(Debug, Clone, PartialEq, Default)]
struct WindowState {
    focused: bool,
    active_editor: Option<String>,
    visible_editors: Vec<String>,
}
snapshot_by_clone!(WindowState);

#[derive(Debug, Default)]
struct WindowPatch {
    focused: Option<bool>,
    active_editor: Option<Option<String>>,
    visible_editors: Option<Vec<String>>,
}

impl StoreValue for WindowState {
    type Patch = WindowPatch;

    fn apply_patch(&mut self, patch: WindowPatch) {
        if let Some(focused) = patch.focused {
            self.focused = focused;
        }
        if let Some(active) = patch.active_editor {
            self.active_editor = active;
        }
        if let Some(visible) = patch.visible_editors {
            self.visible_editors = visible;
        }
    }
}

/// A window facade: one store, several derived channels, bulk cleanup.
#[test]
fn window_facade_fans_out_state_changes() {
    let registry = ChannelRegistry::new();
    let state = ObservableStore::new(WindowState {
        focused: true,
        ..WindowState::default()
    })
    .named("window");
    let on_active: EventChannel<Option<String>> =
        EventChannel::named("onDidChangeActiveTextEditor").with_registry(&registry);
    let on_focus: EventChannel<bool> =
        EventChannel::named("onDidChangeWindowState").with_registry(&registry);

    let mut links = SubscriptionBag::new();
    links.push(bridge::forward_field(&state, &on_active, |s: &WindowState| {
        s.active_editor.clone()
    }));
    links.push(bridge::forward_field(&state, &on_focus, |s: &WindowState| s.focused));

    let events = Rc::new(RefCell::new(Vec::new()));
    let e1 = Rc::clone(&events);
    on_active
        .subscribe_into(
            move |editor| e1.borrow_mut().push(format!("active={editor:?}")),
            &mut links,
        )
        .unwrap();
    let e2 = Rc::clone(&events);
    on_focus
        .subscribe_into(move |f| e2.borrow_mut().push(format!("focused={f}")), &mut links)
        .unwrap();
    assert_eq!(registry.listener_counts().values().sum::<usize>(), 2);

    state.update(|_| {
        Update::Merge(WindowPatch {
            active_editor: Some(Some("/src/main.rs".into())),
            visible_editors: Some(vec!["/src/main.rs".into()]),
            ..WindowPatch::default()
        })
    });
    state.update(|_| {
        Update::Merge(WindowPatch {
            focused: Some(false),
            ..WindowPatch::default()
        })
    });
    state.reset();

    assert_eq!(
        *events.borrow(),
        vec![
            "active=Some(\"/src/main.rs\")",
            "focused=false",
            "active=None",
            "focused=true",
        ]
    );
    assert_eq!(state.current(), WindowState {
        focused: true,
        ..WindowState::default()
    });

    links.dispose();
    assert_eq!(state.subscriber_count(), 0);
    assert_eq!(registry.listener_counts().values().sum::<usize>(), 0);

    on_active.dispose();
    on_focus.dispose();
    assert_eq!(registry.count(), 0);
}

#[test]
fn store_listener_publishing_into_busy_channel_is_queued() {
    let store = ObservableStore::new(0_u32);
    let channel: EventChannel<u32> = EventChannel::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    // A channel listener that mutates the store, whose subscriber publishes
    // back into the same channel mid-delivery.
    let _link = bridge::forward_transitions(&store, &channel, |n: &u32, _| Some(*n));
    let writer = store.clone();
    let o1 = Rc::clone(&order);
    channel
        .subscribe(move |v| {
            o1.borrow_mut().push(("first", *v));
            if *v == 0 {
                writer.replace(1);
            }
        })
        .unwrap();
    let o2 = Rc::clone(&order);
    channel
        .subscribe(move |v| o2.borrow_mut().push(("second", *v)))
        .unwrap();

    channel.publish(0);
    assert_eq!(
        *order.borrow(),
        vec![("first", 0), ("second", 0), ("first", 1), ("second", 1)]
    );
}
