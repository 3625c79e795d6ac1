// Property File Parser
// Parses simple key=value property files

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Parse property file content, invoking `handler` with `(key, value)` for
/// each entry.
///
/// Keys keep their case. `#` starts a comment, either on its own line or after
/// a value. Whitespace around keys and values is trimmed. Lines without `=`
/// are logged and skipped.
pub fn parse_propfile(data: &str, handler: &mut dyn FnMut(&str, &str)) {
    for (number, raw) in data.lines().enumerate() {
        let line = match raw.find('#') {
            Some(hash) => &raw[..hash],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            log::warn!("line {}: key without value: {}", number + 1, line);
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            log::warn!("line {}: value without key", number + 1);
            continue;
        }
        handler(key, value.trim());
    }
}

/// Property file containing key-value pairs. Keys are case-insensitive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyFile {
    properties: HashMap<String, String>,
}

impl PropertyFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a property file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut properties = HashMap::new();
        parse_propfile(content, &mut |key, value| {
            properties.insert(key.to_ascii_lowercase(), value.to_string());
        });
        Self { properties }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterate over `(lowercased key, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
