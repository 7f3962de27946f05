//! Key normalization for directory lookups and ledger comparisons
//!
//! Every normalizer here is idempotent: feeding its output back in returns the
//! same string. Ledger dedup relies on that, since keys read back from a
//! ledger file are normalized again before comparison.

use serde::{Deserialize, Serialize};

/// How the designated key column identifies a remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyColumnKind {
    /// Tax ID (CPF); resolved through the directory service
    NaturalKey,
    /// Full name; resolved through the directory service, first match wins
    Name,
    /// Remote record ID already present in the sheet
    RemoteId,
}

impl KeyColumnKind {
    /// Whether rows keyed this way need a directory lookup before navigation
    pub fn needs_lookup(&self) -> bool {
        !matches!(self, KeyColumnKind::RemoteId)
    }

    /// Get display label for messages
    pub fn label(&self) -> &'static str {
        match self {
            KeyColumnKind::NaturalKey => "tax ID",
            KeyColumnKind::Name => "name",
            KeyColumnKind::RemoteId => "remote ID",
        }
    }

    /// Normalize a raw cell value according to this key kind
    pub fn normalize(&self, raw: &str) -> ResolvedKey {
        let normalized = match self {
            KeyColumnKind::NaturalKey => normalize_tax_id(raw),
            KeyColumnKind::Name => normalize_name(raw),
            KeyColumnKind::RemoteId => normalize_remote_id(raw),
        };
        ResolvedKey(normalized)
    }
}

impl std::fmt::Display for KeyColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized row key used for lookups and dedup comparisons
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedKey(String);

impl ResolvedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wrap a value that is already normalized (e.g. read back from a ledger)
    pub(crate) fn from_normalized(value: impl Into<String>) -> Self {
        ResolvedKey(value.into())
    }
}

impl std::fmt::Display for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip a tax ID down to its digits: "123.456.789-00" -> "12345678900"
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Strip whitespace and float artifacts from a remote ID: " 4512.0 " -> "4512"
pub fn normalize_remote_id(raw: &str) -> String {
    let mut value = raw.trim();
    while let Some(stripped) = strip_zero_fraction(value) {
        value = stripped.trim_end();
    }
    value.to_string()
}

/// Trim a name and collapse inner whitespace runs to single spaces
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "4512.00" -> Some("4512"); anything else -> None
fn strip_zero_fraction(value: &str) -> Option<&str> {
    let dot = value.rfind('.')?;
    let fraction = &value[dot + 1..];
    if !fraction.is_empty() && fraction.chars().all(|c| c == '0') {
        Some(&value[..dot])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_id_digits_only() {
        assert_eq!(normalize_tax_id("123.456.789-00"), "12345678900");
        assert_eq!(normalize_tax_id("  123 456 789 00 "), "12345678900");
        assert_eq!(normalize_tax_id("n/a"), "");
    }

    #[test]
    fn test_remote_id_strips_float_artifacts() {
        assert_eq!(normalize_remote_id("4512.0"), "4512");
        assert_eq!(normalize_remote_id(" 4512.000 "), "4512");
        assert_eq!(normalize_remote_id("4512 .0"), "4512");
        assert_eq!(normalize_remote_id("4512.5"), "4512.5");
        assert_eq!(normalize_remote_id("4512.0.0"), "4512");
        assert_eq!(normalize_remote_id("   "), "");
    }

    #[test]
    fn test_name_collapses_whitespace() {
        assert_eq!(normalize_name("  Maria   da  Silva "), "Maria da Silva");
    }

    #[test]
    fn test_normalizers_are_idempotent() {
        let samples = [
            "123.456.789-00",
            "4512.0",
            " 4512.0.00 ",
            "4512 .0",
            "  Ana\tPaula  ",
            "",
            ".0",
            "abc.0",
        ];
        for kind in [
            KeyColumnKind::NaturalKey,
            KeyColumnKind::Name,
            KeyColumnKind::RemoteId,
        ] {
            for sample in samples {
                let once = kind.normalize(sample);
                let twice = kind.normalize(once.as_str());
                assert_eq!(once, twice, "{kind} normalizer not idempotent for {sample:?}");
            }
        }
    }

    #[test]
    fn test_key_kind_lookup_requirement() {
        assert!(KeyColumnKind::NaturalKey.needs_lookup());
        assert!(KeyColumnKind::Name.needs_lookup());
        assert!(!KeyColumnKind::RemoteId.needs_lookup());
    }

    #[test]
    fn test_key_kind_deserializes_camel_case() {
        let kind: KeyColumnKind = serde_json::from_str("\"naturalKey\"").unwrap();
        assert_eq!(kind, KeyColumnKind::NaturalKey);
        let kind: KeyColumnKind = serde_json::from_str("\"remoteId\"").unwrap();
        assert_eq!(kind, KeyColumnKind::RemoteId);
    }
}
