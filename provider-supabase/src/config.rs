//! Supabase connection settings

use std::fmt;

use crate::error::{Result, SupabaseError};

/// Table read when none is configured
pub const DEFAULT_TABLE: &str = "lotto_results";

pub const URL_ENV: &str = "LOTTO_SUPABASE_URL";
pub const ANON_KEY_ENV: &str = "LOTTO_SUPABASE_ANON_KEY";
pub const TABLE_ENV: &str = "LOTTO_SUPABASE_TABLE";

/// Project URL, anon key and table name.
///
/// The key never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    url: String,
    anon_key: String,
    table: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().trim_end_matches('/').to_string();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(SupabaseError::InvalidConfig(format!(
                "project URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(SupabaseError::InvalidConfig("anon key is empty".to_string()));
        }

        Ok(Self {
            url,
            anon_key,
            table: DEFAULT_TABLE.to_string(),
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SupabaseError::InvalidConfig(format!("invalid table name '{}'", table)));
        }
        self.table = table;
        Ok(self)
    }

    /// Read `LOTTO_SUPABASE_URL`, `LOTTO_SUPABASE_ANON_KEY` and the optional
    /// `LOTTO_SUPABASE_TABLE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(URL_ENV)
            .ok_or_else(|| SupabaseError::InvalidConfig(format!("{} is not set", URL_ENV)))?;
        let anon_key = lookup(ANON_KEY_ENV)
            .ok_or_else(|| SupabaseError::InvalidConfig(format!("{} is not set", ANON_KEY_ENV)))?;

        let config = Self::new(url, anon_key)?;
        match lookup(TABLE_ENV).filter(|t| !t.trim().is_empty()) {
            Some(table) => config.with_table(table.trim()),
            None => Ok(config),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// REST endpoint of the configured table.
    pub fn table_endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("table", &self.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = SupabaseConfig::new("https://abc.supabase.co/", "anon").unwrap();
        assert_eq!(config.url(), "https://abc.supabase.co");
        assert_eq!(
            config.table_endpoint(),
            "https://abc.supabase.co/rest/v1/lotto_results"
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(SupabaseConfig::new("abc.supabase.co", "anon").is_err());
        assert!(SupabaseConfig::new("https://abc.supabase.co", "  ").is_err());
        assert!(SupabaseConfig::new("https://abc.supabase.co", "anon")
            .unwrap()
            .with_table("results;drop")
            .is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = SupabaseConfig::from_lookup(env(&[
            (URL_ENV, "https://abc.supabase.co"),
            (ANON_KEY_ENV, "anon"),
            (TABLE_ENV, "powerball_results"),
        ]))
        .unwrap();
        assert_eq!(config.table(), "powerball_results");

        let missing = SupabaseConfig::from_lookup(env(&[(URL_ENV, "https://abc.supabase.co")]));
        assert!(matches!(missing, Err(SupabaseError::InvalidConfig(msg)) if msg.contains(ANON_KEY_ENV)));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = SupabaseConfig::new("https://abc.supabase.co", "super-secret-key").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
