//! Application configuration loaded from environment variables.

use std::str::FromStr;

use domain::AccessPolicy;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` - bind address (default: `"0.0.0.0"`)
/// - `PORT` - listen port (default: `3000`)
/// - `RUST_LOG` - tracing filter directive (default: `"info"`)
/// - `WEBHOOK_SECRET` - HMAC key for payment webhooks (default: `"whsec_dev"`)
/// - `STAFF_ROLES` - comma-separated staff role names (default: `"ADMIN,EMPLOYEE"`)
/// - `ORDER_CONFLICT_RETRIES` - retries on concurrent order updates (default: `3`)
/// - `DEFAULT_PAGE_SIZE` / `MAX_PAGE_SIZE` - search paging (default: `20` / `100`)
///
/// Unparseable numbers fall back to their default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub webhook_secret: String,
    pub staff_roles: Vec<String>,
    pub conflict_retries: u32,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed::<u16>(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            webhook_secret: lookup("WEBHOOK_SECRET").unwrap_or(defaults.webhook_secret),
            staff_roles: lookup("STAFF_ROLES")
                .map(|raw| split_roles(&raw))
                .unwrap_or(defaults.staff_roles),
            conflict_retries: parsed::<u32>(&lookup, "ORDER_CONFLICT_RETRIES")
                .unwrap_or(defaults.conflict_retries),
            default_page_size: parsed::<usize>(&lookup, "DEFAULT_PAGE_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.default_page_size),
            max_page_size: parsed::<usize>(&lookup, "MAX_PAGE_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.max_page_size),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(&self.staff_roles)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            webhook_secret: "whsec_dev".to_string(),
            staff_roles: vec!["ADMIN".to_string(), "EMPLOYEE".to_string()],
            conflict_retries: 3,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Actor;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]);
        assert_eq!(config, Config::default());
        assert_eq!(config.webhook_secret, "whsec_dev");
        assert_eq!(config.conflict_retries, 3);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("WEBHOOK_SECRET", "whsec_live"),
            ("STAFF_ROLES", " admin , support ,"),
            ("ORDER_CONFLICT_RETRIES", "0"),
            ("MAX_PAGE_SIZE", "50"),
        ]);
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.webhook_secret, "whsec_live");
        assert_eq!(config.staff_roles, vec!["admin", "support"]);
        assert_eq!(config.conflict_retries, 0);
        assert_eq!(config.max_page_size, 50);
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "http"), ("DEFAULT_PAGE_SIZE", "0")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.default_page_size, 20);
    }

    #[test]
    fn test_staff_roles_feed_the_policy() {
        let config = from_pairs(&[("STAFF_ROLES", "SUPPORT")]);
        let policy = config.access_policy();

        assert!(policy.is_staff(&Actor::new(common::UserId::new(), ["support"])));
        assert!(!policy.is_staff(&Actor::new(common::UserId::new(), ["ADMIN"])));
    }
}
