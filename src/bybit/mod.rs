pub mod client;
pub mod rate_limit;

pub use client::BybitClient;
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
