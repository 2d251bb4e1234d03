pub mod ip;
pub mod rate_limiter;
pub mod storage;
pub mod tracker;

pub use ip::{resolve_client_ip, resolve_user_agent};
pub use rate_limiter::RegistrationRateLimiter;
pub use storage::PostgresBlockedIpStore;
pub use tracker::{BlockedIpStore, IpAbuseTracker};
