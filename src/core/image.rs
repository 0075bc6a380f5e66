//! Container image introspection
//!
//! Reads the output of `docker image inspect` into an [`ImageInfo`], which
//! supplies the default entrypoint, environment and working directory of a
//! machine whose root drive was built from that image.

use std::collections::BTreeMap;

use semver::Version;
use serde::Deserialize;

use crate::config::defaults::{LABEL_PREFIX, MIN_SDK_VERSION, REQUIRED_ARCHITECTURE};
use crate::core::bytes::parse_size;
use crate::error::BuildError;

/// Cartesi labels attached to an application image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageLabels {
    /// `io.cartesi.rollups.ram_size`
    pub ram_size: Option<String>,
    /// `io.cartesi.rollups.data_size`
    pub data_size: Option<String>,
    /// `io.cartesi.rollups.sdk_version`
    pub sdk_version: Option<String>,
}

/// Metadata introspected from a container image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInfo {
    /// `CMD`
    pub cmd: Vec<String>,
    /// `ENTRYPOINT`
    pub entrypoint: Vec<String>,
    /// `ENV`, as `NAME=value` entries
    pub env: Vec<String>,
    /// `WORKDIR`
    pub workdir: Option<String>,
    /// Cartesi labels
    pub labels: ImageLabels,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    architecture: Option<String>,
    config: Option<InspectConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    cmd: Option<Vec<String>>,
    entrypoint: Option<Vec<String>>,
    env: Option<Vec<String>>,
    working_dir: Option<String>,
    labels: Option<BTreeMap<String, String>>,
}

fn label(name: &str) -> String {
    format!("{LABEL_PREFIX}.{name}")
}

impl ImageInfo {
    /// Parse `docker image inspect` output for `image`
    ///
    /// Fails when the image is not riscv64 or carries an invalid
    /// `data_size` label.
    pub fn from_inspect(image: &str, json: &str) -> Result<Self, BuildError> {
        let entries: Vec<InspectEntry> =
            serde_json::from_str(json).map_err(|e| BuildError::Inspect {
                image: image.to_string(),
                message: e.to_string(),
            })?;
        let entry = entries.into_iter().next().ok_or_else(|| BuildError::Inspect {
            image: image.to_string(),
            message: "no image returned".to_string(),
        })?;

        let architecture = entry.architecture.unwrap_or_default();
        if architecture != REQUIRED_ARCHITECTURE {
            return Err(BuildError::ArchitectureMismatch {
                found: architecture,
                expected: REQUIRED_ARCHITECTURE.to_string(),
            });
        }

        let config = entry.config.unwrap_or_default();
        let mut labels = config.labels.unwrap_or_default();
        let labels = ImageLabels {
            ram_size: labels.remove(&label("ram_size")),
            data_size: labels.remove(&label("data_size")),
            sdk_version: labels.remove(&label("sdk_version")),
        };
        validate_labels(&labels)?;

        Ok(Self {
            cmd: config.cmd.unwrap_or_default(),
            entrypoint: config.entrypoint.unwrap_or_default(),
            env: config.env.unwrap_or_default(),
            workdir: config.working_dir.filter(|w| !w.is_empty()),
            labels,
        })
    }

    /// `ENTRYPOINT` followed by `CMD`, joined by spaces
    pub fn command_line(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .entrypoint
            .iter()
            .chain(&self.cmd)
            .map(String::as_str)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

fn validate_labels(labels: &ImageLabels) -> Result<(), BuildError> {
    if let Some(data_size) = &labels.data_size {
        if parse_size(data_size).is_none() {
            return Err(BuildError::InvalidLabel {
                label: label("data_size"),
                value: data_size.clone(),
            });
        }
    }

    if let Some(sdk_version) = &labels.sdk_version {
        match Version::parse(sdk_version) {
            Ok(version) => {
                let minimum = Version::parse(MIN_SDK_VERSION).unwrap_or(Version::new(0, 0, 0));
                if version < minimum {
                    tracing::warn!(
                        "Unsupported sdk version: {version} (used) < {minimum} (minimum)"
                    );
                }
            }
            Err(_) => tracing::warn!("sdk version is not a valid semver: {sdk_version}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspect(architecture: &str, config: &str) -> String {
        format!(r#"[{{"Id": "sha256:abc", "Architecture": "{architecture}", "Config": {config}}}]"#)
    }

    #[test]
    fn test_from_inspect() {
        let json = inspect(
            "riscv64",
            r#"{
                "Cmd": ["python3", "app.py"],
                "Entrypoint": ["rollup-init"],
                "Env": ["PATH=/usr/bin", "ROLLUP_HTTP_SERVER_URL=http://127.0.0.1:5004"],
                "WorkingDir": "/opt/cartesi/app",
                "Labels": {
                    "io.cartesi.rollups.ram_size": "128Mi",
                    "io.cartesi.rollups.data_size": "32Mb",
                    "io.cartesi.rollups.sdk_version": "0.12.0",
                    "maintainer": "someone"
                }
            }"#,
        );
        let info = ImageInfo::from_inspect("app", &json).unwrap();

        assert_eq!(info.cmd, vec!["python3", "app.py"]);
        assert_eq!(info.entrypoint, vec!["rollup-init"]);
        assert_eq!(info.env.len(), 2);
        assert_eq!(info.workdir.as_deref(), Some("/opt/cartesi/app"));
        assert_eq!(info.labels.ram_size.as_deref(), Some("128Mi"));
        assert_eq!(info.labels.data_size.as_deref(), Some("32Mb"));
        assert_eq!(info.labels.sdk_version.as_deref(), Some("0.12.0"));
        assert_eq!(
            info.command_line().as_deref(),
            Some("rollup-init python3 app.py")
        );
    }

    #[test]
    fn test_null_fields_default_to_empty() {
        let json = inspect(
            "riscv64",
            r#"{"Cmd": null, "Entrypoint": null, "Env": null, "WorkingDir": "", "Labels": null}"#,
        );
        let info = ImageInfo::from_inspect("app", &json).unwrap();
        assert_eq!(info, ImageInfo::default());
        assert_eq!(info.command_line(), None);
    }

    #[test]
    fn test_architecture_mismatch() {
        let err = ImageInfo::from_inspect("app", &inspect("amd64", "{}")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid image Architecture: amd64. Expected riscv64"
        );
    }

    #[test]
    fn test_invalid_data_size_label() {
        let json = inspect(
            "riscv64",
            r#"{"Labels": {"io.cartesi.rollups.data_size": "lots"}}"#,
        );
        let err = ImageInfo::from_inspect("app", &json).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid io.cartesi.rollups.data_size value: lots"
        );
    }

    #[test]
    fn test_old_sdk_version_only_warns() {
        let json = inspect(
            "riscv64",
            r#"{"Labels": {"io.cartesi.rollups.sdk_version": "0.4.0"}}"#,
        );
        assert!(ImageInfo::from_inspect("app", &json).is_ok());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ImageInfo::from_inspect("app", "not json"),
            Err(BuildError::Inspect { .. })
        ));
        assert!(matches!(
            ImageInfo::from_inspect("app", "[]"),
            Err(BuildError::Inspect { .. })
        ));
    }
}
