//! Service layer: caching, OTP flow, rate limiting and SMS delivery.

pub mod cache;
pub mod otp;
pub mod rate_limit;
pub mod sms;

pub use cache::RedisCache;
pub use otp::OtpService;
pub use rate_limit::RateLimiter;
pub use sms::SmsSender;
