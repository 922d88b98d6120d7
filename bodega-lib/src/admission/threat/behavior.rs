use std::collections::VecDeque;
use std::time::Instant;

use super::monitor::{Category, Finding, MsgMeta, ViolationKind};
use crate::config::ThreatConfig;
use crate::event::Severity;

/// Flag identical-message flooding, command flooding and bot-like timing
/// over the customer's recent message metadata.
pub(super) fn analyze_behavior(
    recent: &VecDeque<MsgMeta>,
    now: Instant,
    config: &ThreatConfig,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let short_window = config.short_window();

    let in_short: Vec<&MsgMeta> = recent
        .iter()
        .filter(|m| now.saturating_duration_since(m.at) < short_window)
        .collect();

    if let Some(last) = in_short.last() {
        let identical = in_short.iter().filter(|m| m.hash == last.hash).count();
        if identical >= config.identical_flood_max {
            findings.push(Finding {
                category: Category::Behavior,
                severity: Severity::High,
                kind: ViolationKind::IdenticalFlood,
            });
        }
    }

    let commands = in_short.iter().filter(|m| m.is_command).count();
    if commands >= config.command_flood_max {
        findings.push(Finding {
            category: Category::Behavior,
            severity: Severity::Medium,
            kind: ViolationKind::CommandFlood,
        });
    }

    if let Some(finding) = bot_timing(recent, config) {
        findings.push(finding);
    }

    findings
}

/// Low variance plus a short mean interval between consecutive messages
/// reads as scripted traffic, not a human typing.
fn bot_timing(recent: &VecDeque<MsgMeta>, config: &ThreatConfig) -> Option<Finding> {
    let needed = config.bot_min_samples + 1;
    if recent.len() < needed {
        return None;
    }

    let tail: Vec<&MsgMeta> = recent.iter().rev().take(needed).collect();
    let mut intervals_ms: Vec<f64> = Vec::with_capacity(config.bot_min_samples);
    for pair in tail.windows(2) {
        // reversed order: pair[0] is newer than pair[1]
        let delta = pair[0].at.saturating_duration_since(pair[1].at);
        intervals_ms.push(delta.as_secs_f64() * 1000.0);
    }

    let mean = intervals_ms.iter().sum::<f64>() / intervals_ms.len() as f64;
    let variance = intervals_ms
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / intervals_ms.len() as f64;
    let stddev = variance.sqrt();

    if mean < config.bot_max_mean_ms as f64 && stddev < config.bot_max_stddev_ms as f64 {
        Some(Finding {
            category: Category::Behavior,
            severity: Severity::High,
            kind: ViolationKind::BotTiming,
        })
    } else {
        None
    }
}
