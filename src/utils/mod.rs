//! Utility types and functions

pub mod class_names;
pub mod detection;

pub use class_names::ClassNames;
pub use detection::{Candidate, Detection, Rect, Suppressor};
