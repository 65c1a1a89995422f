mod client;
mod rate_limit;

pub use client::HttpDraftClient;
pub use rate_limit::RateLimitStore;
