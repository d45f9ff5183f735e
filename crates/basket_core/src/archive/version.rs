//! Archive version gate.
//!
//! The `read-compatible` and `write-compatible` header lists name reader
//! versions able to open the archive. Only one hop is checked: a listed
//! version is never used to look up further versions.

use std::cmp::Ordering;

/// Archive format version written by this crate.
pub const CURRENT_ARCHIVE_VERSION: &str = "0.6.1";

/// Result of comparing an archive's version against this reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Safe to read and to write back.
    Compatible,
    /// Readable, but saving may lose data.
    PossiblyCompatible,
    /// Must not be extracted.
    Incompatible,
}

/// Compares dotted numeric versions. `None` when either side is not numeric.
pub fn compare_versions(left: &str, right: &str) -> Option<Ordering> {
    let parse = |value: &str| -> Option<Vec<u64>> {
        value
            .trim()
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
            .collect()
    };
    let mut left = parse(left)?;
    let mut right = parse(right)?;
    let len = left.len().max(right.len());
    left.resize(len, 0);
    right.resize(len, 0);
    Some(left.cmp(&right))
}

/// Decides whether an archive may be extracted by this reader.
pub fn check_compatibility(
    version: Option<&str>,
    read_compatible: &[String],
    write_compatible: &[String],
) -> Compatibility {
    let listed = |list: &[String]| list.iter().any(|v| v.trim() == CURRENT_ARCHIVE_VERSION);

    if let Some(version) = version {
        if matches!(
            compare_versions(version, CURRENT_ARCHIVE_VERSION),
            Some(Ordering::Less | Ordering::Equal)
        ) {
            return Compatibility::Compatible;
        }
    }
    if listed(write_compatible) {
        Compatibility::Compatible
    } else if listed(read_compatible) {
        Compatibility::PossiblyCompatible
    } else {
        Compatibility::Incompatible
    }
}
