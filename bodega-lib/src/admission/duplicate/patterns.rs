//! Advisory spam-pattern analyses over the detector's histories.
//!
//! These surface signals for the threat monitor and operators; they do not
//! block traffic themselves.

use std::collections::VecDeque;
use std::time::Instant;

use super::detector::{HistoryEntry, TenantEntry};
use super::similarity::similarity;
use crate::config::DuplicateConfig;

/// A per-customer advisory signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpamSignal {
    /// The same text repeated within the history window.
    IdenticalRepeats { count: usize },
    /// Many short messages in rapid succession.
    RapidShortMessages { count: usize },
    /// Near-identical variations of one base text ("hello", "hello!",
    /// "hello?").
    PatternVariations { base: String, variants: usize },
}

/// Multiple distinct customers converging on near-identical content.
#[derive(Debug, Clone)]
pub struct CoordinatedSpam {
    pub customers: usize,
    pub sample: String,
}

const RAPID_SHORT_LEN: usize = 6;
const RAPID_SHORT_MIN: usize = 5;
const IDENTICAL_REPEAT_MIN: usize = 3;
const VARIATION_MIN: usize = 3;

pub(crate) fn spam_signals(history: &VecDeque<HistoryEntry>, config: &DuplicateConfig) -> Vec<SpamSignal> {
    let now = Instant::now();
    let window = config.history_window();
    let recent: Vec<&HistoryEntry> = history
        .iter()
        .filter(|e| now.saturating_duration_since(e.at) < window)
        .collect();

    let mut signals = Vec::new();

    // Identical repeats: same hash appearing again and again.
    let mut best_repeat = 0usize;
    for (i, entry) in recent.iter().enumerate() {
        let count = recent[i..].iter().filter(|e| e.hash == entry.hash).count();
        best_repeat = best_repeat.max(count);
    }
    if best_repeat >= IDENTICAL_REPEAT_MIN {
        signals.push(SpamSignal::IdenticalRepeats { count: best_repeat });
    }

    let short = recent
        .iter()
        .filter(|e| e.text.chars().count() <= RAPID_SHORT_LEN)
        .count();
    if short >= RAPID_SHORT_MIN {
        signals.push(SpamSignal::RapidShortMessages { count: short });
    }

    // Punctuation/casing variations of one base form.
    let mut bases: Vec<(String, usize, usize)> = Vec::new(); // (base, total, distinct raw)
    for entry in &recent {
        let base = normalize(&entry.text);
        match bases.iter_mut().find(|(b, _, _)| *b == base) {
            Some((_, total, distinct)) => {
                *total += 1;
                if recent
                    .iter()
                    .filter(|e| normalize(&e.text) == base)
                    .any(|e| e.text != entry.text)
                {
                    *distinct = (*distinct).max(2);
                }
            }
            None => bases.push((base, 1, 1)),
        }
    }
    for (base, total, distinct) in bases {
        if total >= VARIATION_MIN && distinct > 1 && !base.is_empty() {
            signals.push(SpamSignal::PatternVariations { base, variants: total });
            break;
        }
    }

    signals
}

pub(crate) fn coordinated_spam(
    history: &VecDeque<TenantEntry>,
    config: &DuplicateConfig,
) -> Option<CoordinatedSpam> {
    let now = Instant::now();
    let window = config.history_window();
    let recent: Vec<&TenantEntry> = history
        .iter()
        .filter(|e| now.saturating_duration_since(e.at) < window)
        .collect();

    // Group by similarity against the first entry of each group; count
    // distinct customers per group.
    let mut groups: Vec<(&TenantEntry, Vec<&str>)> = Vec::new();
    for entry in recent.iter().copied() {
        let mut placed = false;
        for (head, customers) in groups.iter_mut() {
            let matches = head.hash == entry.hash
                || (head.chars <= config.max_similarity_len
                    && entry.chars <= config.max_similarity_len
                    && similarity(&head.text, &entry.text) >= config.similarity_threshold);
            if matches {
                if !customers.contains(&entry.customer_id.as_str()) {
                    customers.push(&entry.customer_id);
                }
                placed = true;
                break;
            }
        }
        if !placed {
            groups.push((entry, vec![&entry.customer_id]));
        }
    }

    groups
        .into_iter()
        .filter(|(_, customers)| customers.len() >= config.identical_threshold)
        .max_by_key(|(_, customers)| customers.len())
        .map(|(head, customers)| CoordinatedSpam {
            customers: customers.len(),
            sample: head.text.clone(),
        })
}

fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(['!', '?', '.', ',', '…'])
        .to_lowercase()
}
