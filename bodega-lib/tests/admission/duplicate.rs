use bodega_lib::admission::duplicate::SpamSignal;
use bodega_lib::config::DuplicateConfig;
use bodega_lib::{DuplicateDetector, RejectReason};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::helpers::{event, event_with_id};

fn config() -> DuplicateConfig {
    DuplicateConfig {
        exact_window_ms: 150,
        history_window_ms: 1_000,
        customer_history: 16,
        tenant_history: 64,
        min_similarity_len: 10,
        max_similarity_len: 500,
        similarity_threshold: 0.8,
        identical_threshold: 3,
        similar_threshold: 5,
        processing_timeout_ms: 100,
    }
}

#[test]
fn fresh_message_is_recorded_and_locked() {
    let detector = DuplicateDetector::new(config());

    let verdict = detector.should_process(&event("c1", "t1", "hola, quiero cafe"));
    assert!(verdict.should_process());
    assert!(verdict.fingerprint().is_some());
}

#[test]
fn same_message_id_is_rejected() {
    let detector = DuplicateDetector::new(config());

    let first = event_with_id("c1", "t1", "hola", "retry-1");
    let verdict = detector.should_process(&first);
    assert!(verdict.should_process());

    // Transport redelivery: same id, same content.
    let retry = event_with_id("c1", "t1", "hola", "retry-1");
    let verdict = detector.should_process(&retry);
    assert_eq!(verdict.reason(), Some(RejectReason::ExactMessageId));
}

#[test]
fn identical_content_while_processing_is_held_back() {
    let detector = DuplicateDetector::new(config());

    let verdict = detector.should_process(&event("c1", "t1", "hello"));
    assert!(verdict.should_process());

    // complete() was never called, the lock is live.
    let verdict = detector.should_process(&event("c1", "t1", "hello"));
    assert_eq!(verdict.reason(), Some(RejectReason::CurrentlyProcessing));
}

#[test]
fn identical_content_after_completion_is_an_exact_duplicate() {
    let detector = DuplicateDetector::new(config());

    let verdict = detector.should_process(&event("c1", "t1", "hello"));
    let fp = verdict.fingerprint().unwrap();
    detector.complete(fp);

    for _ in 0..5 {
        let verdict = detector.should_process(&event("c1", "t1", "hello"));
        assert_eq!(verdict.reason(), Some(RejectReason::ExactContent));
    }
}

#[test]
fn stale_processing_lock_self_heals() {
    let detector = DuplicateDetector::new(config());

    assert!(detector.should_process(&event("c1", "t1", "hello")).should_process());

    // Past the processing timeout but inside the exact window the message
    // is still an exact duplicate, just no longer "currently processing".
    sleep(Duration::from_millis(120));
    let verdict = detector.should_process(&event("c1", "t1", "hello"));
    assert_eq!(verdict.reason(), Some(RejectReason::ExactContent));
}

#[test]
fn exact_window_expiry_allows_the_text_again() {
    let mut cfg = config();
    cfg.history_window_ms = 140;
    let detector = DuplicateDetector::new(cfg);

    let verdict = detector.should_process(&event("c1", "t1", "hello"));
    detector.complete(verdict.fingerprint().unwrap());

    sleep(Duration::from_millis(180));
    assert!(detector.should_process(&event("c1", "t1", "hello")).should_process());
}

#[test]
fn customer_repeat_outside_exact_window_is_caught_by_history() {
    let detector = DuplicateDetector::new(config());

    let verdict = detector.should_process(&event("c1", "t1", "quiero dos panes por favor"));
    detector.complete(verdict.fingerprint().unwrap());

    // Exact window (150ms) passes, history window (1s) does not.
    sleep(Duration::from_millis(180));
    let verdict = detector.should_process(&event("c1", "t1", "quiero dos panes por favor"));
    assert_eq!(verdict.reason(), Some(RejectReason::CustomerRepeat));
}

#[test]
fn near_duplicate_text_is_rejected_as_similar() {
    let detector = DuplicateDetector::new(config());

    let verdict = detector.should_process(&event("c1", "t1", "quiero dos panes por favor"));
    detector.complete(verdict.fingerprint().unwrap());

    let verdict = detector.should_process(&event("c1", "t1", "quiero dos panes por favor!"));
    assert_eq!(verdict.reason(), Some(RejectReason::CustomerSimilar));
}

#[test]
fn overlong_texts_skip_the_similarity_scan() {
    let detector = DuplicateDetector::new(config());
    // Well past max_similarity_len; the quadratic scan must not run on
    // these, only the exact hash applies.
    let long = "necesito un pedido grande para manana ".repeat(40);

    let verdict = detector.should_process(&event("c1", "t1", &long));
    assert!(verdict.should_process());
    detector.complete(verdict.fingerprint().unwrap());

    // Near-identical overlong text: without the cap this would be a
    // CustomerSimilar hit after a multi-second scan.
    let mut variant = long.clone();
    variant.push('!');
    let start = Instant::now();
    let verdict = detector.should_process(&event("c1", "t1", &variant));
    assert!(verdict.should_process());
    assert!(start.elapsed() < Duration::from_millis(100));

    // Identical overlong text is still caught, by the exact hash.
    let verdict = detector.should_process(&event("c1", "t1", &long));
    assert_eq!(verdict.reason(), Some(RejectReason::ExactContent));
}

#[test]
fn short_texts_skip_similarity() {
    let detector = DuplicateDetector::new(config());

    assert!(detector.should_process(&event("c1", "t1", "si")).should_process());
    // One character apart but below min_similarity_len; not similar, and
    // not an exact repeat either.
    assert!(detector.should_process(&event("c1", "t1", "no")).should_process());
}

#[test]
fn tenant_wide_identical_spam_is_coordinated() {
    let detector = DuplicateDetector::new(config());
    let text = "GANA DINERO FACIL AHORA";

    for customer in ["a", "b", "c"] {
        let verdict = detector.should_process(&event(customer, "t1", text));
        assert!(verdict.should_process(), "{customer} should record");
        detector.complete(verdict.fingerprint().unwrap());
        // Space the senders out the way distinct bot accounts would be.
        sleep(Duration::from_millis(160));
    }

    let verdict = detector.should_process(&event("d", "t1", text));
    assert_eq!(verdict.reason(), Some(RejectReason::BusinessSpamIdentical));
}

#[test]
fn spam_stays_within_its_tenant() {
    let detector = DuplicateDetector::new(config());
    let text = "GANA DINERO FACIL AHORA";

    for customer in ["a", "b", "c"] {
        let verdict = detector.should_process(&event(customer, "t1", text));
        detector.complete(verdict.fingerprint().unwrap());
        sleep(Duration::from_millis(50));
    }

    // A different tenant is unaffected by t1's history.
    assert!(detector.should_process(&event("d", "t2", text)).should_process());
}

#[test]
fn punctuation_variants_surface_as_a_pattern_signal() {
    let detector = DuplicateDetector::new(config());

    // Short texts dodge both the exact hash and the similarity scan, so
    // they all get recorded; the advisory analysis still groups them.
    for text in ["hola", "hola!", "hola?"] {
        let verdict = detector.should_process(&event("c1", "t1", text));
        assert!(verdict.should_process());
        detector.complete(verdict.fingerprint().unwrap());
    }

    let signals = detector.detect_spam_patterns("c1");
    assert!(signals.iter().any(|s| matches!(
        s,
        SpamSignal::PatternVariations { base, variants: 3 } if base == "hola"
    )));
}

#[test]
fn rapid_short_messages_surface_as_a_signal() {
    let detector = DuplicateDetector::new(config());

    for text in ["si", "no", "ok", "ya", "dale"] {
        assert!(detector.should_process(&event("c1", "t1", text)).should_process());
    }

    let signals = detector.detect_spam_patterns("c1");
    assert!(signals
        .iter()
        .any(|s| matches!(s, SpamSignal::RapidShortMessages { count } if *count >= 5)));
    // An unknown customer has no signals at all.
    assert!(detector.detect_spam_patterns("nobody").is_empty());
}

#[test]
fn converging_customers_surface_as_coordinated_spam() {
    let detector = DuplicateDetector::new(config());
    let text = "GANA DINERO FACIL AHORA";

    for customer in ["a", "b", "c"] {
        let verdict = detector.should_process(&event(customer, "t1", text));
        detector.complete(verdict.fingerprint().unwrap());
    }

    let spam = detector.detect_coordinated_spam("t1").expect("convergence detected");
    assert_eq!(spam.customers, 3);
    assert_eq!(spam.sample, text);
    assert!(detector.detect_coordinated_spam("t2").is_none());
}

#[test]
fn sweep_drops_expired_state() {
    let mut cfg = config();
    cfg.history_window_ms = 100;
    let detector = DuplicateDetector::new(cfg);

    let verdict = detector.should_process(&event("c1", "t1", "hello"));
    detector.complete(verdict.fingerprint().unwrap());
    assert_eq!(detector.stats().fingerprints, 1);

    sleep(Duration::from_millis(200));
    detector.sweep();
    let stats = detector.stats();
    assert_eq!(stats.fingerprints, 0);
    assert_eq!(stats.tracked_customers, 0);
    assert_eq!(stats.tracked_tenants, 0);
}
