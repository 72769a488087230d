use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default width of the patient search window, in days, when a search
    /// request supplies no date range.
    pub search_window_days: i64,
    /// Upper bound on how far a recurring availability may extend past its
    /// first date.
    pub recurrence_horizon_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            search_window_days: read_days("SEARCH_WINDOW_DAYS", 7),
            recurrence_horizon_days: read_days("RECURRENCE_HORIZON_DAYS", 365),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_window_days: 7,
            recurrence_horizon_days: 365,
        }
    }
}

fn read_days(var: &str, default: i64) -> i64 {
    match env::var(var) {
        Ok(raw) => match raw.parse::<i64>() {
            Ok(days) if days > 0 => days,
            _ => {
                warn!("{} set to {:?}, expected a positive day count, using {}", var, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_env_fallbacks() {
        let config = AppConfig::default();
        assert_eq!(config.search_window_days, 7);
        assert_eq!(config.recurrence_horizon_days, 365);
    }
}
