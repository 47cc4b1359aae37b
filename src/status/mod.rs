//! Hub status: conditions, observed-resource mapping and phase aggregation

pub mod aggregate;
pub mod conditions;
pub mod fields;
pub mod mapping;

pub use aggregate::{calculate_status, derive_phase, Observed, PlatformFlags};
