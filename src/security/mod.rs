pub mod headers;
pub mod origin;
pub mod rate_limit;
pub mod sanitize;

pub use rate_limit::RateLimiter;
