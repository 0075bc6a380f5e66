//! Version handling for external tools and SDK images
//!
//! Tools report versions in free-form banners (`mksquashfs version 4.6.1
//! (2023/03/25)`, `genext2fs 1.5.6`); the first semver-looking token wins.

use std::sync::OnceLock;

use regex::Regex;
use semver::{Version, VersionReq};
use thiserror::Error;

/// Errors related to version checking
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    /// Installed version does not satisfy the requirement
    #[error("{origin} version {current} does not satisfy requirement '{constraint}'")]
    VersionMismatch {
        current: String,
        constraint: String,
        origin: String,
    },

    /// Invalid version constraint format
    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    /// Invalid version format
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?(-[0-9A-Za-z.-]+)?").expect("Invalid version regex")
    })
}

/// Find the first version number in a tool banner
///
/// Two-component versions (`4.6`) are read as `4.6.0`.
///
/// # Examples
/// ```
/// use cartesi_build::core::version::extract_version;
///
/// let v = extract_version("mksquashfs version 4.6.1 (2023/03/25)").unwrap();
/// assert_eq!(v.to_string(), "4.6.1");
/// assert!(extract_version("no digits here").is_none());
/// ```
pub fn extract_version(text: &str) -> Option<Version> {
    let caps = version_regex().captures(text)?;
    let patch = caps.get(3).map_or("0", |m| m.as_str());
    let pre = caps.get(4).map_or("", |m| m.as_str());
    Version::parse(&format!("{}.{}.{patch}{pre}", &caps[1], &caps[2])).ok()
}

/// Parse and validate a semver version string
pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    Version::parse(version).map_err(|e| VersionError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// Parse and validate a semver version constraint
pub fn parse_constraint(constraint: &str) -> Result<VersionReq, VersionError> {
    VersionReq::parse(constraint).map_err(|e| VersionError::InvalidConstraint {
        constraint: constraint.to_string(),
        reason: e.to_string(),
    })
}

/// Check that `version` satisfies `constraint`
///
/// `origin` names the tool or image in the error message.
pub fn check_version_constraint(
    version: &Version,
    constraint: &str,
    origin: &str,
) -> Result<(), VersionError> {
    if parse_constraint(constraint)?.matches(version) {
        Ok(())
    } else {
        Err(VersionError::VersionMismatch {
            current: version.to_string(),
            constraint: constraint.to_string(),
            origin: origin.to_string(),
        })
    }
}
