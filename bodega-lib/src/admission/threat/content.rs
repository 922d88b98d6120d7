use super::monitor::{Category, Finding, ViolationKind};
use crate::config::ThreatConfig;
use crate::event::Severity;

const INJECTION_TOKENS: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "onerror=",
    "onclick=",
    "onload=",
    "<iframe",
    "<img",
];

const NON_PRINTABLE_MAX: usize = 5;

/// Flag overlong messages, suspicious keyword fragments, injection-like
/// tokens and excess non-printable characters.
pub(super) fn analyze_content(text: &str, config: &ThreatConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    let lower = text.to_lowercase();

    if text.chars().count() > config.max_message_len {
        findings.push(Finding {
            category: Category::Content,
            severity: Severity::Medium,
            kind: ViolationKind::Overlong,
        });
    }

    let keyword_hits = config
        .suspicious_keywords
        .iter()
        .filter(|kw| lower.contains(kw.as_str()))
        .count();
    if keyword_hits > 0 {
        let severity = if keyword_hits > 1 { Severity::Medium } else { Severity::Low };
        findings.push(Finding {
            category: Category::Content,
            severity,
            kind: ViolationKind::SuspiciousKeyword,
        });
    }

    if INJECTION_TOKENS.iter().any(|t| lower.contains(t)) || has_tag_like_bracket(&lower) {
        findings.push(Finding {
            category: Category::Content,
            severity: Severity::High,
            kind: ViolationKind::InjectionPattern,
        });
    }

    let non_printable = text
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    if non_printable > NON_PRINTABLE_MAX {
        findings.push(Finding {
            category: Category::Content,
            severity: Severity::Medium,
            kind: ViolationKind::NonPrintable,
        });
    }

    findings
}

/// A `<` immediately followed by an ASCII letter or `/` reads as markup.
fn has_tag_like_bracket(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    bytes.windows(2).any(|w| {
        w[0] == b'<' && (w[1].is_ascii_alphabetic() || w[1] == b'/')
    })
}
