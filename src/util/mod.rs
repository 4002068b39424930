//! Utility modules: text truncation, timeout.

pub mod text;
pub mod timeout;
