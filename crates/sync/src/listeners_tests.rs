// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

fn counter() -> (Arc<AtomicU32>, impl Fn(&u32) + Send + Sync + 'static) {
    let seen = Arc::new(AtomicU32::new(0));
    let sink = Arc::clone(&seen);
    (seen, move |v: &u32| {
        sink.fetch_add(*v, Ordering::SeqCst);
    })
}

#[test]
fn subscribe_invokes_with_initial_value() {
    let listeners = Listeners::new("test");
    let (seen, listener) = counter();
    let _sub = listeners.subscribe(Some(&7), listener);
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}

#[test]
fn subscribe_without_initial_waits_for_publish() {
    let listeners = Listeners::new("test");
    let (seen, listener) = counter();
    let _sub = listeners.subscribe(None, listener);
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    listeners.publish(&3);
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[test]
fn dropping_subscription_unsubscribes() {
    let listeners = Listeners::new("test");
    let (seen, listener) = counter();
    let sub = listeners.subscribe(None, listener);
    assert_eq!(listeners.len(), 1);

    sub.unsubscribe();
    assert!(listeners.is_empty());
    listeners.publish(&5);
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_listener_does_not_block_others() {
    let listeners = Listeners::new("test");
    let _bad = listeners.subscribe(None, |_: &u32| panic!("listener failure"));
    let (seen, listener) = counter();
    let _good = listeners.subscribe(None, listener);

    listeners.publish(&2);
    listeners.publish(&2);
    assert_eq!(seen.load(Ordering::SeqCst), 4);
}

#[test]
fn panicking_listener_on_subscribe_is_isolated() {
    let listeners = Listeners::new("test");
    let _bad = listeners.subscribe(Some(&1), |_: &u32| panic!("listener failure"));
    assert_eq!(listeners.len(), 1);
}

#[test]
fn clear_removes_all_and_late_unsubscribe_is_harmless() {
    let listeners = Listeners::new("test");
    let (seen, listener) = counter();
    let sub = listeners.subscribe(None, listener);
    listeners.clear();
    listeners.publish(&1);
    drop(sub);
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[test]
fn subscription_outliving_registry_is_harmless() {
    let listeners = Listeners::new("test");
    let (_, listener) = counter();
    let sub = listeners.subscribe(None, listener);
    drop(listeners);
    drop(sub);
}

#[test]
fn combined_subscription_cancels_all() {
    let a = Listeners::new("a");
    let b = Listeners::new("b");
    let (_, la) = counter();
    let (_, lb) = counter();
    let sub = Subscription::combine([a.subscribe(None, la), b.subscribe(None, lb)]);
    assert_eq!(a.len() + b.len(), 2);
    drop(sub);
    assert_eq!(a.len() + b.len(), 0);
}
