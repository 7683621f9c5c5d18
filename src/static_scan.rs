//! Decoding a user-supplied image: every preprocessing candidate against the
//! hardware strategy first, then the same list against the software decoder.

use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::models::CodeResult;
use crate::preprocess::{Candidate, Preprocessor};
use crate::strategy::DecodeStrategy;
use crate::validator::validate;

/// Static-image scanner over an ordered list of strategies
pub struct StaticImageScanner {
    preprocessor: Preprocessor,
    strategies: Vec<Arc<dyn DecodeStrategy>>,
    deep_link_base: Option<String>,
}

impl StaticImageScanner {
    /// Strategies are tried in the given order, each over every candidate
    pub fn new(
        preprocessor: Preprocessor,
        strategies: Vec<Arc<dyn DecodeStrategy>>,
        deep_link_base: Option<String>,
    ) -> Self {
        Self {
            preprocessor,
            strategies,
            deep_link_base,
        }
    }

    /// Decode image bytes (PNG, JPEG, ...) and scan them
    pub async fn scan_bytes(&self, bytes: &[u8]) -> Result<CodeResult, ScanError> {
        let image = Preprocessor::decode_bytes(bytes)?;
        self.scan_image(&image).await
    }

    /// Scan an already decoded image
    pub async fn scan_image(&self, image: &DynamicImage) -> Result<CodeResult, ScanError> {
        let candidates = self.preprocessor.prepare(image);
        debug!(
            candidates = candidates.len(),
            width = image.width(),
            height = image.height(),
            "static image prepared"
        );
        scan_candidates(&candidates, &self.strategies, self.deep_link_base.as_deref()).await
    }
}

/// Run `candidates` through `strategies` in search order.
///
/// A strategy that errors is abandoned for the remaining candidates. Payloads
/// that decode but fail validation are remembered so exhaustion can report
/// them instead of a plain miss.
pub async fn scan_candidates(
    candidates: &[Candidate],
    strategies: &[Arc<dyn DecodeStrategy>],
    deep_link_base: Option<&str>,
) -> Result<CodeResult, ScanError> {
    let mut rejected: Option<String> = None;

    for strategy in strategies {
        let kind = strategy.kind();
        if let Err(e) = strategy.warm_up().await {
            warn!(strategy = %kind, "strategy unavailable for static image: {e}");
            continue;
        }
        for candidate in candidates {
            match strategy.attempt_decode(&candidate.frame).await {
                Ok(Some(payload)) => {
                    match validate(&payload).into_code_result(deep_link_base, Some(kind)) {
                        Some(result) => {
                            info!(strategy = %kind, candidate = ?candidate.kind, "static image decoded");
                            return Ok(result);
                        }
                        None => {
                            debug!(candidate = ?candidate.kind, "payload failed validation");
                            rejected.get_or_insert(payload);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(strategy = %kind, "strategy failed on static image, moving on: {e}");
                    break;
                }
            }
        }
    }

    match rejected {
        Some(payload) => Err(ScanError::InvalidPayload { payload }),
        None => Err(ScanError::NoCodeFound),
    }
}
