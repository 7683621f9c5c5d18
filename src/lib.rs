//! attend_qr - attendance check-in by QR code
//!
//! Opens a camera through a platform [`camera::CameraBackend`], decodes QR
//! codes from the live stream with either a platform-accelerated detector or
//! an in-process software decoder, and hands exactly one validated 12-hex
//! attendance token per session to the caller. Uploaded images take a
//! separate path through a preprocessing pipeline.
//!
//! ```no_run
//! # async fn run(backend: std::sync::Arc<dyn attend_qr::camera::CameraBackend>) {
//! use attend_qr::{Scanner, ScannerConfig};
//!
//! let scanner = Scanner::new(backend, ScannerConfig::from_env());
//! scanner
//!     .open(|result: attend_qr::CodeResult| println!("checked in: {}", result.code))
//!     .await
//!     .ok();
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Platform camera seams, enumeration, acquisition and zoom
pub mod camera;
/// Scanner tuning knobs
pub mod config;
/// Error taxonomy
pub mod error;
/// Core data structures (devices, frames, codes, zoom)
pub mod models;
/// Static-image candidate generation
pub mod preprocess;
/// Decode orchestration and the public scanner
pub mod scanner;
/// Session ownership and teardown
pub mod session;
/// Static-image search across strategies
pub mod static_scan;
/// Hardware and software decode strategies
pub mod strategy;
/// Raster helpers (grayscale, contrast, transforms)
pub mod utils;
/// Payload validation and token extraction
pub mod validator;

pub use config::ScannerConfig;
pub use error::{CameraError, ErrorKind, ScanError, StrategyError};
pub use models::{CameraDevice, CanonicalCode, CodeResult, Frame, StrategyKind, ZoomMode, ZoomState};
pub use scanner::{ManualEntryReason, ScanListener, ScanStatus, Scanner, ScannerBuilder, ScannerState};
pub use session::Generation;
pub use validator::{Validation, validate};
