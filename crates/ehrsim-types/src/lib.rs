//! Validated primitive types shared across the EHR simulator crates.
//!
//! These types push validation to the edges: once a value exists it is known to be valid, so
//! services further in never re-check it.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a summary type string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown summary type '{0}' (expected 'historical' or 'current')")]
pub struct UnknownSummaryType(pub String);

/// The two kinds of clinical summary kept per patient.
///
/// `Historical` summaries are comprehensive overviews of the whole record. `Current` summaries
/// describe recent activity and are updated incrementally from their predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SummaryType {
    Historical,
    Current,
}

impl SummaryType {
    /// Both summary types, in display order.
    pub const ALL: [SummaryType; 2] = [SummaryType::Historical, SummaryType::Current];

    /// Wire/storage form of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            SummaryType::Historical => "historical",
            SummaryType::Current => "current",
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryType {
    type Err = UnknownSummaryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "historical" => Ok(SummaryType::Historical),
            "current" => Ok(SummaryType::Current),
            other => Err(UnknownSummaryType(other.to_string())),
        }
    }
}

impl serde::Serialize for SummaryType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for SummaryType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Patient stable.  ").expect("should accept padded text");
        assert_eq!(text.as_str(), "Patient stable.");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        let err = NonEmptyText::new(" \n\t ").expect_err("whitespace-only should be rejected");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn summary_type_round_trips_through_strings() {
        for summary_type in SummaryType::ALL {
            let parsed: SummaryType = summary_type.as_str().parse().expect("should parse");
            assert_eq!(parsed, summary_type);
        }
    }

    #[test]
    fn summary_type_rejects_unknown_values() {
        let err = "discharge".parse::<SummaryType>().expect_err("should reject");
        assert_eq!(err, UnknownSummaryType("discharge".into()));
    }

    #[test]
    fn summary_type_deserialises_from_json() {
        let parsed: SummaryType = serde_json::from_str("\"current\"").expect("valid json");
        assert_eq!(parsed, SummaryType::Current);
        assert!(serde_json::from_str::<SummaryType>("\"weekly\"").is_err());
    }
}
