//! Key normalization applied to crossnet endpoints before lookup.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A named key transform, parsed once from configuration.
///
/// Textual forms: `identity`, `strip-version`, `after-dot`, `uppercase`,
/// `lowercase`, `strip-prefix:<prefix>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyTransform {
    #[default]
    Identity,
    /// `ENSP00000269305.4` → `ENSP00000269305`
    StripVersion,
    /// Everything after the first `.`: `9606.ENSP00000269305` → `ENSP00000269305`
    AfterDot,
    Uppercase,
    Lowercase,
    /// `UniProtKB:P04637` → `P04637` with prefix `UniProtKB:`
    StripPrefix(String),
}

impl KeyTransform {
    pub fn apply<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self {
            KeyTransform::Identity => Cow::Borrowed(key),
            KeyTransform::StripVersion => match key.rsplit_once('.') {
                Some((base, version))
                    if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) =>
                {
                    Cow::Borrowed(base)
                }
                _ => Cow::Borrowed(key),
            },
            KeyTransform::AfterDot => {
                Cow::Borrowed(key.split_once('.').map_or(key, |(_, tail)| tail))
            }
            KeyTransform::Uppercase => Cow::Owned(key.to_uppercase()),
            KeyTransform::Lowercase => Cow::Owned(key.to_lowercase()),
            KeyTransform::StripPrefix(prefix) => {
                Cow::Borrowed(key.strip_prefix(prefix.as_str()).unwrap_or(key))
            }
        }
    }
}

/// Sub-token of a qualified identifier: the whole key if it has no `.`,
/// otherwise the text between the first and second `.`.
pub fn qualified_tail(key: &str) -> &str {
    let mut parts = key.split('.');
    let first = parts.next().unwrap_or_default();
    parts.next().unwrap_or(first)
}

impl fmt::Display for KeyTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyTransform::Identity => f.write_str("identity"),
            KeyTransform::StripVersion => f.write_str("strip-version"),
            KeyTransform::AfterDot => f.write_str("after-dot"),
            KeyTransform::Uppercase => f.write_str("uppercase"),
            KeyTransform::Lowercase => f.write_str("lowercase"),
            KeyTransform::StripPrefix(prefix) => write!(f, "strip-prefix:{prefix}"),
        }
    }
}

impl FromStr for KeyTransform {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(prefix) = s.strip_prefix("strip-prefix:") {
            if prefix.is_empty() {
                return Err(RegistryError::InvalidTransform {
                    name: s.to_string(),
                });
            }
            return Ok(KeyTransform::StripPrefix(prefix.to_string()));
        }
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "identity" | "none" => Ok(KeyTransform::Identity),
            "strip-version" => Ok(KeyTransform::StripVersion),
            "after-dot" => Ok(KeyTransform::AfterDot),
            "uppercase" => Ok(KeyTransform::Uppercase),
            "lowercase" => Ok(KeyTransform::Lowercase),
            _ => Err(RegistryError::InvalidTransform {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for KeyTransform {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyTransform> for String {
    fn from(value: KeyTransform) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_transforms() {
        assert_eq!("identity".parse::<KeyTransform>().unwrap(), KeyTransform::Identity);
        assert_eq!("strip_version".parse::<KeyTransform>().unwrap(), KeyTransform::StripVersion);
        assert_eq!(
            "strip-prefix:UniProtKB:".parse::<KeyTransform>().unwrap(),
            KeyTransform::StripPrefix("UniProtKB:".to_string())
        );
        assert!(matches!(
            "reverse".parse::<KeyTransform>(),
            Err(RegistryError::InvalidTransform { .. })
        ));
        assert!("strip-prefix:".parse::<KeyTransform>().is_err());
    }

    #[test]
    fn test_apply() {
        assert_eq!(KeyTransform::StripVersion.apply("ENSP00000269305.4"), "ENSP00000269305");
        assert_eq!(KeyTransform::StripVersion.apply("GO:0008150"), "GO:0008150");
        assert_eq!(KeyTransform::StripVersion.apply("HLA.A"), "HLA.A");
        assert_eq!(KeyTransform::AfterDot.apply("9606.ENSP00000269305"), "ENSP00000269305");
        assert_eq!(KeyTransform::AfterDot.apply("TP53"), "TP53");
        assert_eq!(KeyTransform::AfterDot.apply("9606.ENSP00000269305.4"), "ENSP00000269305.4");
        assert_eq!(KeyTransform::Uppercase.apply("tp53"), "TP53");
        assert_eq!(
            KeyTransform::StripPrefix("UniProtKB:".into()).apply("UniProtKB:P04637"),
            "P04637"
        );
        assert_eq!(KeyTransform::StripPrefix("UniProtKB:".into()).apply("P04637"), "P04637");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let t = KeyTransform::StripPrefix("HGNC:".to_string());
        assert_eq!(t.to_string().parse::<KeyTransform>().unwrap(), t);
    }

    #[test]
    fn test_qualified_tail() {
        assert_eq!(qualified_tail("9606.ENSP1"), "ENSP1");
        assert_eq!(qualified_tail("a.b.c"), "b");
        assert_eq!(qualified_tail("plain"), "plain");
        assert_eq!(qualified_tail(""), "");
    }
}
