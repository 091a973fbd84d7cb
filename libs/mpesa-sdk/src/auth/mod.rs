//! Bearer token issuance and caching.

mod clock;
mod manager;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{DEFAULT_EXPIRY_SKEW, TokenManager, TokenState};
pub use token::AccessToken;
