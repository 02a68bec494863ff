//! Rate limiting logic and state management.

mod limiter;
mod window;

pub use limiter::{RateLimitDecision, RateLimitSettings, SlidingWindowLimiter};
pub use window::ClientWindow;
