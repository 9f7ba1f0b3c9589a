//! Build and on-disk schema versions

/// Crate version (semver)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the stored operation log layout. Bumped when a stored log can
/// no longer be read by older builds; new payload kinds do not bump it,
/// since older builds keep them as unknown operations.
pub const SCHEMA_VERSION: u32 = 1;

/// Git commit hash (if available)
pub const GIT_HASH: Option<&str> = option_env!("GIT_HASH");

/// Build profile (debug/release)
pub const BUILD_PROFILE: &str = if cfg!(debug_assertions) {
    "debug"
} else {
    "release"
};

/// Full version string with metadata
pub fn version_string() -> String {
    let mut version = format!("Tally v{}", VERSION);

    if let Some(hash) = GIT_HASH {
        version.push_str(&format!(" ({})", &hash[..hash.len().min(8)]));
    }

    if BUILD_PROFILE == "debug" {
        version.push_str(" [debug]");
    }

    version
}

/// Whether a log written with `stored` schema can be opened by this build.
/// Older layouts are readable; logs from a newer build are not.
pub fn is_schema_compatible(stored: u32) -> bool {
    (1..=SCHEMA_VERSION).contains(&stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_package() {
        assert_eq!(VERSION, "0.1.1");
        assert!(version_string().starts_with("Tally v0.1.1"));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        assert!(is_schema_compatible(SCHEMA_VERSION));
        assert!(!is_schema_compatible(SCHEMA_VERSION + 1));
        assert!(!is_schema_compatible(0));
    }
}
