use std::fmt;

/// Which decode backend produced a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Platform-provided accelerated frame detector
    Hardware,
    /// In-process software decoder
    Software,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Hardware => f.write_str("hardware"),
            StrategyKind::Software => f.write_str("software"),
        }
    }
}

/// Normalised attendance token: always 12 lowercase hex characters.
///
/// Only the validator can build one, so holding a `CanonicalCode` is proof the
/// format was checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalCode(String);

impl CanonicalCode {
    /// Token length in characters
    pub const LEN: usize = 12;

    /// Wrap a string the validator already matched against `[a-fA-F0-9]{12}`.
    pub(crate) fn from_matched(hex: &str) -> Self {
        debug_assert!(hex.len() == Self::LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()));
        Self(hex.to_ascii_lowercase())
    }

    /// Token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated scan result handed to the success callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeResult {
    /// Canonical token
    pub code: CanonicalCode,
    /// Best-effort link for informational display
    pub deep_link: Option<String>,
    /// Strategy that decoded it; `None` for manual entry
    pub strategy: Option<StrategyKind>,
}

/// Outcome of one decode attempt on one frame or candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeAttempt {
    /// Decoded payload, if any
    pub raw_payload: Option<String>,
    /// Strategy that ran
    pub strategy: StrategyKind,
    /// Whether a payload was found
    pub success: bool,
}

impl DecodeAttempt {
    /// Nothing found on this attempt
    pub fn miss(strategy: StrategyKind) -> Self {
        Self {
            raw_payload: None,
            strategy,
            success: false,
        }
    }

    /// A payload was decoded (not yet validated)
    pub fn hit(strategy: StrategyKind, payload: String) -> Self {
        Self {
            raw_payload: Some(payload),
            strategy,
            success: true,
        }
    }
}
