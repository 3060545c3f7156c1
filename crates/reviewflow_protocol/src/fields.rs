//! Named review fields.
//!
//! Every component addresses row data through these names. Physical column
//! positions belong to the schema registry and never leak outside it.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical column of a review table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "FileID")]
    FileId,
    FileName,
    #[serde(rename = "FileURL")]
    FileUrl,
    Purpose,
    TargetAudience,
    DescriptiveName,
    VersionDate,
    Version,
    Uploader,
    CreatedAt,
    Priority,
    Status,
    ReviewerComment,
    MedicalRisk,
    LegalRisk,
    RegulatoryRisk,
    SecondaryComment,
    RoutedOn,
    LastAction,
    Error,
    SourceTable,
    Sprint,
    ArchivedOn,
}

impl Field {
    pub const ALL: &'static [Field] = &[
        Field::FileId,
        Field::FileName,
        Field::FileUrl,
        Field::Purpose,
        Field::TargetAudience,
        Field::DescriptiveName,
        Field::VersionDate,
        Field::Version,
        Field::Uploader,
        Field::CreatedAt,
        Field::Priority,
        Field::Status,
        Field::ReviewerComment,
        Field::MedicalRisk,
        Field::LegalRisk,
        Field::RegulatoryRisk,
        Field::SecondaryComment,
        Field::RoutedOn,
        Field::LastAction,
        Field::Error,
        Field::SourceTable,
        Field::Sprint,
        Field::ArchivedOn,
    ];

    /// Column header name as it appears in the tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileId => "FileID",
            Self::FileName => "FileName",
            Self::FileUrl => "FileURL",
            Self::Purpose => "Purpose",
            Self::TargetAudience => "TargetAudience",
            Self::DescriptiveName => "DescriptiveName",
            Self::VersionDate => "VersionDate",
            Self::Version => "Version",
            Self::Uploader => "Uploader",
            Self::CreatedAt => "CreatedAt",
            Self::Priority => "Priority",
            Self::Status => "Status",
            Self::ReviewerComment => "ReviewerComment",
            Self::MedicalRisk => "MedicalRisk",
            Self::LegalRisk => "LegalRisk",
            Self::RegulatoryRisk => "RegulatoryRisk",
            Self::SecondaryComment => "SecondaryComment",
            Self::RoutedOn => "RoutedOn",
            Self::LastAction => "LastAction",
            Self::Error => "Error",
            Self::SourceTable => "SourceTable",
            Self::Sprint => "Sprint",
            Self::ArchivedOn => "ArchivedOn",
        }
    }

    /// Resolve a header cell to a field.
    ///
    /// Exact names win; otherwise matching ignores case, spaces and underscores
    /// so that "File ID" or "file_url" headers still resolve.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(field) = Self::ALL.iter().find(|f| f.as_str() == raw) {
            return Some(*field);
        }
        let wanted = squash(raw);
        Self::ALL
            .iter()
            .find(|f| squash(f.as_str()) == wanted)
            .copied()
    }
}

fn squash(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ProtocolError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::parse(field.as_str()), Some(*field));
        }
    }

    #[test]
    fn loose_header_matching() {
        assert_eq!(Field::parse("File ID"), Some(Field::FileId));
        assert_eq!(Field::parse("file_url"), Some(Field::FileUrl));
        assert_eq!(Field::parse("routed on"), Some(Field::RoutedOn));
        assert_eq!(Field::parse("Reviewer"), None);
    }

    #[test]
    fn serde_uses_header_names() {
        let json = serde_json::to_string(&Field::FileId).unwrap();
        assert_eq!(json, "\"FileID\"");
        let parsed: Field = serde_json::from_str("\"FileURL\"").unwrap();
        assert_eq!(parsed, Field::FileUrl);
    }
}
