//! `key=value;key=value` connection strings used by sources and targets

use std::collections::HashMap;

/// Case-insensitive view over a semicolon delimited connection string.
///
/// Keys are lowercased with spaces removed, values are trimmed. A segment
/// without `=` is kept as a key with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    values: HashMap<String, String>,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Self {
        let mut values = HashMap::new();

        for segment in raw.split(';') {
            let mut parts = segment.splitn(2, '=');
            let key: String = parts
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase()
                .chars()
                .filter(|c| *c != ' ')
                .collect();

            if key.is_empty() {
                continue;
            }

            let value = parts.next().map(|v| v.trim().to_string()).unwrap_or_default();
            values.insert(key, value);
        }

        Self { values }
    }

    /// Value for `key`, `None` when absent or empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether the key was present at all, even without a value
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_lowercase())
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
