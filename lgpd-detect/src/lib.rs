//! # lgpd-detect
//!
//! Pattern library and detection engine for personal data.
//!
//! The library is built once at startup. Every detector carries its own
//! must-match and must-not-match samples, which are checked at load time;
//! a library that fails its samples is never handed to the engine.
//! The engine consumes rows one at a time and folds matches into
//! aggregate or detailed findings.

pub mod engine;
pub mod patterns;

pub use engine::{DetectionEngine, ScanAccumulator};
pub use patterns::{Detector, PatternDef, PatternLibrary, PiiMatch};
