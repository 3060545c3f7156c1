//! Property tests for the file naming convention.

use chrono::NaiveDate;
use proptest::prelude::*;
use reviewflow_protocol::{parse_file_name, NamePattern, ParsedFileName};

/// A name segment: words of letters and digits, never containing `" - "`.
fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,8}( [A-Za-z0-9]{1,8}){0,3}"
}

fn version_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn version() -> impl Strategy<Value = String> {
    "V[0-9]{1,3}(\\.[0-9]{1,2})?"
}

fn extension() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,5}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn five_part_names_survive_reconstruction(
        purpose in segment(),
        audience in segment(),
        name in segment(),
        date in version_date(),
        version in version(),
        ext in extension(),
    ) {
        let parts = ParsedFileName {
            pattern: NamePattern::FivePart,
            purpose,
            target_audience: audience,
            descriptive_name: name,
            version_date: date,
            version,
            extension: ext,
        };
        let file_name = parts.to_file_name();
        let parsed = parse_file_name(&file_name);
        prop_assert_eq!(parsed.as_ref().ok(), Some(&parts), "{}", file_name);
    }

    #[test]
    fn four_part_names_survive_reconstruction(
        purpose in segment(),
        name in segment(),
        date in version_date(),
        version in version(),
        ext in extension(),
    ) {
        let parts = ParsedFileName {
            pattern: NamePattern::FourPart,
            purpose,
            target_audience: String::new(),
            descriptive_name: name,
            version_date: date,
            version,
            extension: ext,
        };
        let file_name = parts.to_file_name();
        let parsed = parse_file_name(&file_name);
        prop_assert_eq!(parsed.as_ref().ok(), Some(&parts), "{}", file_name);
    }

    #[test]
    fn canonical_names_are_fixed_points(
        purpose in segment(),
        audience in prop::option::of(segment()),
        name in segment(),
        date in version_date(),
        version in version(),
        ext in extension(),
    ) {
        let file_name = match audience {
            Some(audience) => format!("{purpose} - {audience} - {name} - {} - {version}.{ext}", date.format("%Y%m%d")),
            None => format!("{purpose} - {name} - {} - {version}.{ext}", date.format("%Y%m%d")),
        };
        let parsed = parse_file_name(&file_name);
        prop_assert!(parsed.is_ok(), "{}", file_name);
        if let Ok(parsed) = parsed {
            prop_assert_eq!(parsed.to_file_name(), file_name);
        }
    }
}
