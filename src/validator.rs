//! Attendance code validation and extraction.
//!
//! Physical codes carry a bare token, a deep link, or a structured JSON payload
//! depending on where they were printed. Extraction is permissive; the only
//! hard rule is that the result is twelve hex characters.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::models::{CanonicalCode, CodeResult, StrategyKind};

static BARE_RE: OnceLock<Regex> = OnceLock::new();
static LINK_RE: OnceLock<Regex> = OnceLock::new();
static ANYWHERE_RE: OnceLock<Regex> = OnceLock::new();

fn bare_re() -> &'static Regex {
    BARE_RE.get_or_init(|| Regex::new(r"(?i)^[a-f0-9]{12}$").expect("static regex"))
}

fn link_re() -> &'static Regex {
    LINK_RE.get_or_init(|| {
        Regex::new(r"(?i)https?://[^\s]*?/a/([a-f0-9]{12})(?:[/?#][^\s]*)?(?:\s|$)")
            .expect("static regex")
    })
}

fn anywhere_re() -> &'static Regex {
    ANYWHERE_RE.get_or_init(|| Regex::new(r"(?i)[a-f0-9]{12}").expect("static regex"))
}

/// Which extraction rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// The whole payload is the token
    Bare,
    /// A `/a/<token>` deep link
    DeepLink,
    /// A JSON payload with an attendance marker
    Structured,
    /// A token embedded somewhere in free text
    Embedded,
}

/// Result of validating a raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// A canonical code was recovered
    Valid {
        /// Normalised token
        code: CanonicalCode,
        /// Rule that produced it
        rule: MatchRule,
        /// The deep link itself when [`MatchRule::DeepLink`] matched
        link: Option<String>,
    },
    /// Nothing in the payload qualifies
    Invalid,
}

impl Validation {
    /// Whether a code was recovered
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    /// The recovered code, if any
    pub fn code(&self) -> Option<&CanonicalCode> {
        match self {
            Validation::Valid { code, .. } => Some(code),
            Validation::Invalid => None,
        }
    }

    /// Best-effort deep link: the scanned link itself, otherwise
    /// `<base>/a/<code>` when a base is configured.
    pub fn deep_link(&self, base: Option<&str>) -> Option<String> {
        match self {
            Validation::Valid {
                link: Some(link), ..
            } => Some(link.clone()),
            Validation::Valid { code, .. } => {
                base.map(|b| format!("{}/a/{}", b.trim_end_matches('/'), code))
            }
            Validation::Invalid => None,
        }
    }

    /// Package a valid result for the success callback
    pub fn into_code_result(
        self,
        deep_link_base: Option<&str>,
        strategy: Option<StrategyKind>,
    ) -> Option<CodeResult> {
        let deep_link = self.deep_link(deep_link_base);
        match self {
            Validation::Valid { code, .. } => Some(CodeResult {
                code,
                deep_link,
                strategy,
            }),
            Validation::Invalid => None,
        }
    }
}

const MARKER_KEYS: [&str; 2] = ["type", "kind"];
const CODE_KEYS: [&str; 3] = ["code", "attendanceCode", "token"];

fn structured_code(raw: &str) -> Option<CanonicalCode> {
    if !raw.starts_with('{') {
        return None;
    }
    let Value::Object(map) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };

    let marked = MARKER_KEYS.iter().any(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .is_some_and(|v| v.eq_ignore_ascii_case("attendance"))
    }) || map.get("attendance").and_then(Value::as_bool) == Some(true);
    if !marked {
        return None;
    }

    CODE_KEYS
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|candidate| bare_re().is_match(candidate))
        .map(CanonicalCode::from_matched)
}

/// Validate a raw decoded payload. Ordered rules, first match wins.
pub fn validate(raw: &str) -> Validation {
    let raw = raw.trim();

    if bare_re().is_match(raw) {
        return Validation::Valid {
            code: CanonicalCode::from_matched(raw),
            rule: MatchRule::Bare,
            link: None,
        };
    }

    if let Some(caps) = link_re().captures(raw) {
        if let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) {
            return Validation::Valid {
                code: CanonicalCode::from_matched(token.as_str()),
                rule: MatchRule::DeepLink,
                link: Some(whole.as_str().trim_end().to_string()),
            };
        }
    }

    if let Some(code) = structured_code(raw) {
        return Validation::Valid {
            code,
            rule: MatchRule::Structured,
            link: None,
        };
    }

    if let Some(found) = anywhere_re().find(raw) {
        return Validation::Valid {
            code: CanonicalCode::from_matched(found.as_str()),
            rule: MatchRule::Embedded,
            link: None,
        };
    }

    Validation::Invalid
}
