//! Outbound ports for the Chat Gateway.

use crate::domain::{Claims, TokenError};

/// Verifies a bearer token and extracts its claims.
///
/// The audience check is not part of verification; the auth layer applies it
/// when production mode is on.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

/// Wall clock in seconds, for token expiry.
pub trait WallClock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// System time implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            // Clock before Unix epoch: treat as 0 rather than panic
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_after_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
