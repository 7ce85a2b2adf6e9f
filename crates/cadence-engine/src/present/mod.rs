//! Swap chain ownership and presentation policy.

mod engine;

pub use engine::{AcquireOutcome, PresentConfig, PresentableImage, PresentationEngine, SkipReason};
