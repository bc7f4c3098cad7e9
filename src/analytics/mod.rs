/// Storefront analytics: visitor data cleanup and rate-limited event tracking

pub mod tracker;
pub mod utils;

pub use tracker::{AnalyticsTracker, TrackOutcome, TrackTarget, VisitorInfo};
