//! Document naming convention.
//!
//! `Purpose - [TargetAudience -] DescriptiveName - yyyymmdd - Version.<ext>`
//!
//! Separators are the exact three-character sequence `" - "`. The five-part
//! form is tried first; the four-part form leaves TargetAudience empty.

use crate::error::ParseError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FIVE_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<purpose>.+?) - (?P<audience>.+?) - (?P<name>.+?) - (?P<date>\d{8}) - (?P<version>\S+?)\.(?P<ext>[A-Za-z0-9]+)$",
    )
    .expect("five-part file name pattern is valid")
});

static FOUR_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<purpose>.+?) - (?P<name>.+?) - (?P<date>\d{8}) - (?P<version>\S+?)\.(?P<ext>[A-Za-z0-9]+)$",
    )
    .expect("four-part file name pattern is valid")
});

const DATE_FORMAT: &str = "%Y%m%d";

/// Which form of the convention a name matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePattern {
    FivePart,
    FourPart,
}

/// Fields extracted from a conforming file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFileName {
    pub pattern: NamePattern,
    pub purpose: String,
    /// Empty for four-part names
    pub target_audience: String,
    pub descriptive_name: String,
    pub version_date: NaiveDate,
    pub version: String,
    pub extension: String,
}

impl ParsedFileName {
    /// VersionDate as stored in tables (`yyyy-mm-dd`).
    pub fn version_date_iso(&self) -> String {
        self.version_date.format("%Y-%m-%d").to_string()
    }

    /// Rebuild the canonical file name from the parsed parts.
    pub fn to_file_name(&self) -> String {
        let date = self.version_date.format(DATE_FORMAT);
        if self.target_audience.is_empty() {
            format!(
                "{} - {} - {} - {}.{}",
                self.purpose, self.descriptive_name, date, self.version, self.extension
            )
        } else {
            format!(
                "{} - {} - {} - {} - {}.{}",
                self.purpose,
                self.target_audience,
                self.descriptive_name,
                date,
                self.version,
                self.extension
            )
        }
    }
}

/// Parse a file name (not a path) against the naming convention.
pub fn parse_file_name(name: &str) -> Result<ParsedFileName, ParseError> {
    if !name.contains('.') {
        return Err(ParseError::MissingExtension(name.to_string()));
    }

    if let Some(caps) = FIVE_PART.captures(name) {
        return Ok(ParsedFileName {
            pattern: NamePattern::FivePart,
            purpose: caps["purpose"].to_string(),
            target_audience: caps["audience"].to_string(),
            descriptive_name: caps["name"].to_string(),
            version_date: parse_date(name, &caps["date"])?,
            version: caps["version"].to_string(),
            extension: caps["ext"].to_string(),
        });
    }

    if let Some(caps) = FOUR_PART.captures(name) {
        return Ok(ParsedFileName {
            pattern: NamePattern::FourPart,
            purpose: caps["purpose"].to_string(),
            target_audience: String::new(),
            descriptive_name: caps["name"].to_string(),
            version_date: parse_date(name, &caps["date"])?,
            version: caps["version"].to_string(),
            extension: caps["ext"].to_string(),
        });
    }

    Err(ParseError::NoPatternMatched(name.to_string()))
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| ParseError::InvalidDate {
        name: name.to_string(),
        date: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_part_name() {
        let parsed = parse_file_name("FAQ - NonHCP - OA - 20250826 - V2.docx").unwrap();
        assert_eq!(parsed.pattern, NamePattern::FivePart);
        assert_eq!(parsed.purpose, "FAQ");
        assert_eq!(parsed.target_audience, "NonHCP");
        assert_eq!(parsed.descriptive_name, "OA");
        assert_eq!(parsed.version_date_iso(), "2025-08-26");
        assert_eq!(parsed.version, "V2");
        assert_eq!(parsed.extension, "docx");
    }

    #[test]
    fn four_part_fallback() {
        let parsed = parse_file_name("Toolkit - MSCs Facts sheet - 20250820 - V1.docx").unwrap();
        assert_eq!(parsed.pattern, NamePattern::FourPart);
        assert_eq!(parsed.purpose, "Toolkit");
        assert_eq!(parsed.target_audience, "");
        assert_eq!(parsed.descriptive_name, "MSCs Facts sheet");
        assert_eq!(parsed.version_date_iso(), "2025-08-20");
        assert_eq!(parsed.version, "V1");
    }

    #[test]
    fn dotted_versions_keep_their_dots() {
        let parsed = parse_file_name("FAQ - HCP - Dosing - 20240101 - V1.2.pdf").unwrap();
        assert_eq!(parsed.version, "V1.2");
        assert_eq!(parsed.extension, "pdf");
    }

    #[test]
    fn reconstruction_matches_input() {
        for name in [
            "FAQ - NonHCP - OA - 20250826 - V2.docx",
            "Toolkit - MSCs Facts sheet - 20250820 - V1.docx",
            "Slide Deck - HCP - Launch plan - 20231130 - V10.pptx",
        ] {
            let parsed = parse_file_name(name).unwrap();
            assert_eq!(parsed.to_file_name(), name);
            assert_eq!(parse_file_name(&parsed.to_file_name()).unwrap(), parsed);
        }
    }

    #[test]
    fn separators_are_exact() {
        assert!(matches!(
            parse_file_name("FAQ-NonHCP-OA-20250826-V2.docx"),
            Err(ParseError::NoPatternMatched(_))
        ));
        assert!(matches!(
            parse_file_name("FAQ – OA – 20250826 – V2.docx"),
            Err(ParseError::NoPatternMatched(_))
        ));
    }

    #[test]
    fn rejects_bad_dates_and_missing_extension() {
        assert!(matches!(
            parse_file_name("FAQ - OA - 20251340 - V2.docx"),
            Err(ParseError::InvalidDate { .. })
        ));
        assert!(matches!(
            parse_file_name("FAQ - OA - 20250826 - V2"),
            Err(ParseError::MissingExtension(_))
        ));
        assert!(matches!(
            parse_file_name("FAQ - OA - 2025082 - V2.docx"),
            Err(ParseError::NoPatternMatched(_))
        ));
    }
}
