//! Parsing of checkpoint request parameters

use crate::error::{CheckpointError, Result};

/// Split the comma separated `containers` query value.
///
/// Entries are trimmed and empty entries dropped, so an absent or empty value
/// yields no containers rather than a single empty name.
pub fn parse_container_names(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Reject names that would resolve outside the workload's checkpoint directory
pub fn validate_container_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(CheckpointError::InvalidContainerName(name.to_string()));
    }
    Ok(())
}

pub fn validate_container_names<S: AsRef<str>>(names: &[S]) -> Result<()> {
    names
        .iter()
        .try_for_each(|name| validate_container_name(name.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_or_empty_yields_no_containers() {
        assert!(parse_container_names(None).is_empty());
        assert!(parse_container_names(Some("")).is_empty());
        assert!(parse_container_names(Some(" , ,")).is_empty());
    }

    #[test]
    fn test_splits_and_trims() {
        assert_eq!(
            parse_container_names(Some("web, sidecar ,,db")),
            vec!["web", "sidecar", "db"]
        );
    }

    #[test]
    fn test_keeps_duplicates_in_order() {
        assert_eq!(parse_container_names(Some("a,b,a")), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_rejects_path_escapes() {
        for bad in ["..", ".", "a/b", "..\\x", ""] {
            assert!(
                matches!(
                    validate_container_name(bad),
                    Err(CheckpointError::InvalidContainerName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_container_names(&["web", "sidecar-1", "db.v2"]).is_ok());
    }
}
