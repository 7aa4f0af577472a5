//! Dot-separated numeric version ordering and latest-version selection.

use std::cmp::Ordering;

use crate::error::{DeckError, Result};
use crate::model::PluginVersionRecord;

/// Split a version string into its numeric segments.
pub fn parse_version(version: &str) -> Result<Vec<u64>> {
    version
        .split('.')
        .map(|segment| {
            segment
                .parse::<u64>()
                .map_err(|_| DeckError::InvalidVersionFormat(version.to_string()))
        })
        .collect()
}

/// Segment-wise comparison; missing trailing segments count as zero.
pub fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    Ok(compare_segments(&parse_version(a)?, &parse_version(b)?))
}

/// Highest non-deprecated version, or `None` when nothing is installable.
///
/// Equal versions resolve to the one listed last.
pub fn select_latest(versions: &[PluginVersionRecord]) -> Result<Option<PluginVersionRecord>> {
    let candidates: Vec<&PluginVersionRecord> =
        versions.iter().filter(|v| !v.deprecated).collect();

    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).clone())),
        _ => {
            let mut keyed = Vec::with_capacity(candidates.len());
            for record in candidates {
                keyed.push((parse_version(&record.version)?, record));
            }
            // max_by returns the last of several equal maxima
            Ok(keyed
                .into_iter()
                .max_by(|(a, _), (b, _)| compare_segments(a, b))
                .map(|(_, record)| record.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(versions: &[&str]) -> Vec<PluginVersionRecord> {
        versions.iter().map(|v| PluginVersionRecord::new(*v)).collect()
    }

    #[test]
    fn numeric_not_lexical_ordering() {
        let latest = select_latest(&records(&["1.2.0", "1.10.0", "1.9.9"])).unwrap();
        assert_eq!(latest.unwrap().version, "1.10.0");
    }

    #[test]
    fn deprecated_versions_are_skipped() {
        let versions = vec![
            PluginVersionRecord::new("1.0.0"),
            PluginVersionRecord::deprecated("2.0.0"),
        ];
        assert_eq!(select_latest(&versions).unwrap().unwrap().version, "1.0.0");
    }

    #[test]
    fn empty_list_has_no_latest() {
        assert!(select_latest(&[]).unwrap().is_none());
    }

    #[test]
    fn all_deprecated_has_no_latest() {
        let versions = vec![
            PluginVersionRecord::deprecated("1.0.0"),
            PluginVersionRecord::deprecated("1.1.0"),
        ];
        assert!(select_latest(&versions).unwrap().is_none());
    }

    #[test]
    fn single_entry_is_returned_without_parsing() {
        let latest = select_latest(&records(&["nightly"])).unwrap();
        assert_eq!(latest.unwrap().version, "nightly");
    }

    #[test]
    fn missing_trailing_segments_are_zero() {
        assert_eq!(compare_versions("1.2", "1.2.0").unwrap(), Ordering::Equal);
        assert_eq!(compare_versions("1.2.1", "1.2").unwrap(), Ordering::Greater);
        let latest = select_latest(&records(&["2", "1.9.9"])).unwrap();
        assert_eq!(latest.unwrap().version, "2");
    }

    #[test]
    fn non_numeric_segment_is_rejected() {
        let err = select_latest(&records(&["1.0.0", "1.0.beta"])).unwrap_err();
        assert!(matches!(err, DeckError::InvalidVersionFormat(ref v) if v == "1.0.beta"));
        assert!(parse_version("1..0").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn deprecated_malformed_entry_is_ignored() {
        let versions = vec![
            PluginVersionRecord::new("1.0.0"),
            PluginVersionRecord::new("1.1.0"),
            PluginVersionRecord::deprecated("bogus"),
        ];
        assert_eq!(select_latest(&versions).unwrap().unwrap().version, "1.1.0");
    }

    #[test]
    fn equal_versions_pick_last() {
        let mut first = PluginVersionRecord::new("1.0");
        first.deprecated_reason = Some("first".into());
        let mut second = PluginVersionRecord::new("1.0.0");
        second.deprecated_reason = Some("second".into());
        let latest = select_latest(&[first, second]).unwrap().unwrap();
        assert_eq!(latest.deprecated_reason.as_deref(), Some("second"));
    }
}
