use semver::Version;

use crate::config::ConfigError;

/// First restic release using `from-` prefixed flags for the source repository.
pub const VERSION_FROM_FLAGS: Version = Version::new(0, 14, 0);

/// Parses a restic version leniently: `0.14`, `0.16.4`, `v0.13.x`.
///
/// Missing or non-numeric components count as zero. restic has never
/// released a 1.0, so a leading component of 10 or more is read as the
/// minor release (`14.0` is `0.14.0`).
pub fn parse_version(input: &str) -> Result<Version, ConfigError> {
    let trimmed = input.trim().trim_start_matches('v');
    let mut parts = trimmed.split('.').map(|part| {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u64>().ok()
    });
    let major = match parts.next().flatten() {
        Some(major) => major,
        None => return Err(ConfigError::InvalidVersion(input.to_string())),
    };
    let minor = parts.next().flatten().unwrap_or_default();
    let patch = parts.next().flatten().unwrap_or_default();
    if major >= 10 {
        return Ok(Version::new(0, major, minor));
    }
    Ok(Version::new(major, minor, patch))
}

/// Whether `version` understands the `from-` flags. Unknown means no.
pub fn uses_from_flags(version: Option<&Version>) -> bool {
    version.is_some_and(|v| *v >= VERSION_FROM_FLAGS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_versions() {
        assert_eq!(parse_version("0.14").unwrap(), Version::new(0, 14, 0));
        assert_eq!(parse_version("v0.16.4").unwrap(), Version::new(0, 16, 4));
        assert_eq!(parse_version("0.13.x").unwrap(), Version::new(0, 13, 0));
        assert_eq!(parse_version("14.0").unwrap(), Version::new(0, 14, 0));
        assert_eq!(parse_version("13.x").unwrap(), Version::new(0, 13, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_version("latest").is_err());
    }

    #[test]
    fn from_flags_threshold() {
        assert!(!uses_from_flags(None));
        assert!(!uses_from_flags(Some(&Version::new(0, 13, 9))));
        assert!(uses_from_flags(Some(&Version::new(0, 14, 0))));
        assert!(uses_from_flags(Some(&Version::new(1, 0, 0))));
    }
}
