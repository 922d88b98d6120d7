use bodega_lib::config::SessionConfig;
use bodega_lib::{SessionKey, SessionStep, SessionStore};
use std::thread::sleep;
use std::time::Duration;

fn config(idle_ms: u64, absolute_ms: u64) -> SessionConfig {
    SessionConfig {
        idle_timeout_ms: idle_ms,
        absolute_timeout_ms: absolute_ms,
        ..SessionConfig::default()
    }
}

#[test]
fn new_session_starts_at_the_menu() {
    let store = SessionStore::new(config(60_000, 120_000));
    let key = SessionKey::new("c1", "t1");

    let session = store.get_or_create(&key);
    assert_eq!(session.step, SessionStep::Menu);
    assert!(session.cart.is_empty());
    assert_eq!(store.len(), 1);
}

#[test]
fn idle_session_expires_lazily_on_access() {
    let store = SessionStore::new(config(100, 60_000));
    let key = SessionKey::new("c1", "t1");
    store.create(key.clone());

    sleep(Duration::from_millis(150));
    assert!(store.get(&key).is_none());
    // The expired entry was removed, not merely hidden.
    assert_eq!(store.len(), 0);

    // A new message after expiry starts a fresh conversation.
    let session = store.get_or_create(&key);
    assert_eq!(session.step, SessionStep::Menu);
}

#[test]
fn activity_refreshes_the_idle_clock() {
    let store = SessionStore::new(config(120, 60_000));
    let key = SessionKey::new("c1", "t1");
    store.create(key.clone());

    for _ in 0..3 {
        sleep(Duration::from_millis(60));
        assert!(store.get(&key).is_some(), "touched session should stay live");
    }
}

#[test]
fn absolute_timeout_ends_even_active_sessions() {
    let store = SessionStore::new(config(60_000, 150));
    let key = SessionKey::new("c1", "t1");
    store.create(key.clone());

    sleep(Duration::from_millis(80));
    assert!(store.get(&key).is_some());
    sleep(Duration::from_millis(100));
    assert!(store.get(&key).is_none());
}

#[test]
fn update_persists_handler_changes() {
    let store = SessionStore::new(config(60_000, 120_000));
    let key = SessionKey::new("c1", "t1");

    let mut session = store.get_or_create(&key);
    session.advance(SessionStep::Catalog).unwrap();
    store.update(&key, session);

    let session = store.get(&key).unwrap();
    assert_eq!(session.step, SessionStep::Catalog);
}

#[test]
fn delete_is_the_terminal_action() {
    let store = SessionStore::new(config(60_000, 120_000));
    let key = SessionKey::new("c1", "t1");
    store.create(key.clone());

    assert!(store.delete(&key));
    assert!(!store.delete(&key));
    assert!(store.get(&key).is_none());
}

#[test]
fn sweep_evicts_expired_sessions_in_bulk() {
    let store = SessionStore::new(config(100, 60_000));
    store.create(SessionKey::new("c1", "t1"));
    store.create(SessionKey::new("c2", "t1"));
    store.create(SessionKey::new("c3", "t2"));

    sleep(Duration::from_millis(150));
    store.create(SessionKey::new("c4", "t2"));

    assert_eq!(store.sweep(), 3);
    assert_eq!(store.len(), 1);
}

#[test]
fn evict_idle_is_stricter_than_the_timeout() {
    let store = SessionStore::new(config(60_000, 120_000));
    store.create(SessionKey::new("c1", "t1"));

    sleep(Duration::from_millis(50));
    // Normal sweep keeps it, the pressure path does not.
    assert_eq!(store.sweep(), 0);
    assert_eq!(store.evict_idle(Duration::from_millis(20)), 1);
    assert!(store.is_empty());
}

#[test]
fn full_store_evicts_the_stalest_session() {
    let store = SessionStore::new(SessionConfig {
        max_sessions: 2,
        ..config(60_000, 120_000)
    });

    store.create(SessionKey::new("old", "t1"));
    sleep(Duration::from_millis(30));
    store.create(SessionKey::new("mid", "t1"));
    sleep(Duration::from_millis(30));
    store.create(SessionKey::new("new", "t1"));

    assert_eq!(store.len(), 2);
    assert!(store.get(&SessionKey::new("old", "t1")).is_none());
    assert!(store.get(&SessionKey::new("new", "t1")).is_some());
}

#[test]
fn stats_estimate_footprint() {
    let store = SessionStore::new(config(60_000, 120_000));
    store.create(SessionKey::new("c1", "t1"));

    let stats = store.stats();
    assert_eq!(stats.active_sessions, 1);
    assert!(stats.estimated_bytes > 0);
}
