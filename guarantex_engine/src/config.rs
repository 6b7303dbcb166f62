use std::env;

use chrono::Duration;
use gtx_common::Money;
use log::*;

const DEFAULT_COMMISSION_PERCENT: f64 = 5.0;
const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_WAITING_BUYER_TIMEOUT_MINUTES: i64 = 10;
const DEFAULT_REAPER_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_MIN_RATINGS_FOR_AVERAGE: i64 = 3;
const DEFAULT_MIN_DESCRIPTION_LEN: usize = 3;
const DEFAULT_MAX_DESCRIPTION_LEN: usize = 200;
const DEFAULT_MAX_MESSAGE_LEN: usize = 1000;
const DEFAULT_MAX_AMOUNT_MAJOR: i64 = 1_000_000;

/// Engine-wide tunables, injected into the API objects at construction time.
///
/// Nothing in the engine reads process-global state at runtime; [`EngineConfig::from_env_or_default`]
/// is the single place environment variables are consulted.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Commission stamped onto new deals, percent.
    pub commission_percent: f64,
    /// Length of generated deal codes.
    pub code_length: usize,
    /// How long a `waiting_buyer` deal may sit unattended before the reaper purges it.
    pub waiting_buyer_timeout: Duration,
    /// How often the reaper wakes up.
    pub reaper_interval: std::time::Duration,
    /// Ratings needed before a user's aggregate departs from the 5.0 default.
    pub min_ratings_for_average: i64,
    pub min_description_len: usize,
    pub max_description_len: usize,
    /// Thread message length cap.
    pub max_message_len: usize,
    /// Upper bound for deal amounts.
    pub max_amount: Money,
    /// The privileged identity that may force-complete/cancel any deal and inspect any thread.
    /// `0` disables the administrative override entirely.
    pub admin_id: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_percent: DEFAULT_COMMISSION_PERCENT,
            code_length: DEFAULT_CODE_LENGTH,
            waiting_buyer_timeout: Duration::minutes(DEFAULT_WAITING_BUYER_TIMEOUT_MINUTES),
            reaper_interval: std::time::Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECONDS),
            min_ratings_for_average: DEFAULT_MIN_RATINGS_FOR_AVERAGE,
            min_description_len: DEFAULT_MIN_DESCRIPTION_LEN,
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_amount: Money::from_major(DEFAULT_MAX_AMOUNT_MAJOR),
            admin_id: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Some(id) = env_i64("GTX_ADMIN_ID") {
            config.admin_id = id;
        }
        if let Ok(pct) = env::var("GTX_COMMISSION_PERCENT") {
            match pct.parse::<f64>() {
                Ok(pct) if pct >= 0.0 => config.commission_percent = pct,
                _ => error!("🪛️ {pct} is not a valid GTX_COMMISSION_PERCENT. Using {}.", config.commission_percent),
            }
        }
        if let Some(len) = env_i64("GTX_DEAL_CODE_LENGTH") {
            if (4..=16).contains(&len) {
                config.code_length = len as usize;
            } else {
                error!("🪛️ GTX_DEAL_CODE_LENGTH must be between 4 and 16. Using {}.", config.code_length);
            }
        }
        if let Some(minutes) = env_i64("GTX_DEAL_TIMEOUT_MINUTES") {
            config.waiting_buyer_timeout = Duration::minutes(minutes);
        }
        config
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_id != 0 && user_id == self.admin_id
    }
}

fn env_i64(var: &str) -> Option<i64> {
    let raw = env::var(var).ok()?;
    match raw.parse::<i64>() {
        Ok(v) => Some(v),
        Err(e) => {
            error!("🪛️ {raw} is not a valid value for {var}: {e}. Ignoring it.");
            None
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_the_product_rules() {
        let config = EngineConfig::default();
        assert_eq!(config.commission_percent, 5.0);
        assert_eq!(config.code_length, 6);
        assert_eq!(config.waiting_buyer_timeout, Duration::minutes(10));
        assert_eq!(config.min_ratings_for_average, 3);
        assert!(!config.is_admin(0), "admin id 0 must mean 'no admin'");
    }

    #[test]
    fn admin_check() {
        let config = EngineConfig { admin_id: 42, ..Default::default() };
        assert!(config.is_admin(42));
        assert!(!config.is_admin(41));
    }
}
