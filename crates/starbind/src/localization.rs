//! `global.ini` string tables.

use std::collections::BTreeMap;

/// Parsed UI strings for one language.
///
/// Keys are matched ASCII case-insensitively, and a leading `@` (as used by
/// references inside game data) is ignored on lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Localization {
    entries: BTreeMap<String, String>,
}

impl Localization {
    /// Parse `key=value` lines.
    ///
    /// Blank lines and lines starting with `;` or `#` are skipped, as are
    /// lines without `=`. A later duplicate key replaces an earlier one.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let entries = text
            .lines()
            .map(str::trim_start)
            .filter(|line| !line.is_empty() && !line.starts_with(';') && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim_end().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { entries }
    }

    /// Look up a string by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.strip_prefix('@').unwrap_or(key);
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by (lowercased) key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_ini() {
        let text = "\u{feff}; header comment\r\n\
                    ui_v_pitch=Pitch\r\n\
                    \r\n\
                    # another comment\n\
                    ui_CG_Desc=Lights = on\n\
                    not a pair\n\
                    ui_v_pitch=Pitch Axis\n";

        let loc = Localization::parse(text);
        assert_eq!(loc.len(), 2);
        assert_eq!(loc.get("ui_v_pitch"), Some("Pitch Axis"));
        assert_eq!(loc.get("@UI_CG_DESC"), Some("Lights = on"));
        assert_eq!(loc.get("missing"), None);
    }

    #[test]
    fn test_iter_is_sorted() {
        let loc = Localization::parse("b=2\na=1\n");
        let keys: Vec<&str> = loc.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b"]);
    }
}
