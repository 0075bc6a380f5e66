//! Drive builders
//!
//! Each drive is produced by one of five strategies selected by its
//! `builder` field. Every strategy writes exactly one `<name>.<format>` file
//! into the destination directory and removes its intermediate files (and its
//! partial output, on failure) before returning.

mod directory;
mod docker;
mod empty;
mod none;
mod tar;

use std::path::{Path, PathBuf};

use crate::core::config::{Builder, DriveConfig};
use crate::core::image::ImageInfo;
use crate::error::{BuildError, ExecError, FilesystemError};
use crate::infra::exec::ExecOptions;

/// Output of a drive build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveResult {
    /// Image file name inside the destination directory
    pub filename: String,
    /// Metadata of the source image, for docker drives
    pub image_info: Option<ImageInfo>,
}

/// Toolchain image used when an encoder is missing on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Image reference
    pub image: String,
    /// Run every encoder inside the image, even when installed locally
    pub force_docker: bool,
}

impl Toolchain {
    /// Fall back to `image` only for missing tools
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            force_docker: false,
        }
    }

    /// Always run encoders inside the image
    #[must_use]
    pub fn force_docker(mut self, force: bool) -> Self {
        self.force_docker = force;
        self
    }

    /// Execution options for a tool working inside `destination`
    pub(crate) fn options(&self, destination: &Path) -> ExecOptions {
        ExecOptions::new()
            .with_cwd(destination)
            .with_image(&self.image)
            .force_docker(self.force_docker)
    }
}

/// Build drive `name` into `destination`
pub async fn build(
    name: &str,
    drive: &DriveConfig,
    toolchain: &Toolchain,
    destination: &Path,
) -> Result<DriveResult, BuildError> {
    tracing::info!("Building drive '{name}' ({})", drive.builder.kind());

    let image_info = match &drive.builder {
        Builder::Directory(d) => {
            directory::build(name, d, toolchain, destination).await?;
            None
        }
        Builder::Docker(d) => Some(docker::build(name, d, toolchain, destination).await?),
        Builder::Empty(d) => {
            empty::build(name, d, toolchain, destination).await?;
            None
        }
        Builder::Tar(d) => {
            tar::build(name, d, toolchain, destination).await?;
            None
        }
        Builder::Existing(d) => {
            none::build(name, d, destination)?;
            None
        }
    };

    let filename = drive.filename(name);
    tracing::info!("Drive '{name}' built: {filename}");
    Ok(DriveResult {
        filename,
        image_info,
    })
}

/// Attach the drive name to a tool failure
fn exec_error(drive: &str) -> impl FnOnce(ExecError) -> BuildError + '_ {
    move |source| BuildError::Exec {
        drive: drive.to_string(),
        source,
    }
}

/// Attach the drive name to a filesystem failure
fn fs_error(drive: &str) -> impl FnOnce(FilesystemError) -> BuildError + '_ {
    move |source| BuildError::Filesystem {
        drive: drive.to_string(),
        source,
    }
}

fn require_source(drive: &str, path: &Path, is_dir: bool) -> Result<(), BuildError> {
    let present = if is_dir { path.is_dir() } else { path.is_file() };
    if present {
        Ok(())
    } else {
        Err(BuildError::SourceNotFound {
            drive: drive.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// `<destination>/<name>.<extension>`
fn artifact(destination: &Path, name: &str, extension: &str) -> PathBuf {
    destination.join(format!("{name}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{EmptyDrive, EmptyDriveFormat, ExistingDrive, DriveFormat};
    use tempfile::TempDir;

    fn drive(builder: Builder) -> DriveConfig {
        DriveConfig {
            builder,
            mount: None,
            shared: None,
            user: None,
        }
    }

    #[tokio::test]
    async fn test_build_raw_drive() {
        let temp = TempDir::new().unwrap();
        let config = drive(Builder::Empty(EmptyDrive {
            format: EmptyDriveFormat::Raw,
            size: 10_000,
        }));

        let result = build("data", &config, &Toolchain::new("sdk"), temp.path())
            .await
            .unwrap();

        assert_eq!(result.filename, "data.raw");
        assert!(result.image_info.is_none());
        let content = std::fs::read(temp.path().join("data.raw")).unwrap();
        assert_eq!(content.len(), 10_000);
        assert!(content.iter().all(|b| *b == 0));
    }

    #[tokio::test]
    async fn test_build_existing_drive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("prebuilt.sqfs");
        std::fs::write(&source, b"hsqs-image-bytes").unwrap();
        let dest = temp.path().join(".cartesi");
        std::fs::create_dir(&dest).unwrap();

        let config = drive(Builder::Existing(ExistingDrive {
            filename: source.clone(),
            format: DriveFormat::Sqfs,
        }));
        let result = build("app", &config, &Toolchain::new("sdk"), &dest)
            .await
            .unwrap();

        assert_eq!(result.filename, "app.sqfs");
        assert_eq!(
            std::fs::read(dest.join("app.sqfs")).unwrap(),
            std::fs::read(&source).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_reported() {
        let temp = TempDir::new().unwrap();
        let config = drive(Builder::Existing(ExistingDrive {
            filename: temp.path().join("missing.ext2"),
            format: DriveFormat::Ext2,
        }));

        let err = build("app", &config, &Toolchain::new("sdk"), temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::SourceNotFound { drive, .. } if drive == "app"));
        assert!(!temp.path().join("app.ext2").exists());
    }

    #[test]
    fn test_toolchain_options() {
        let options = Toolchain::new("cartesi/sdk:test")
            .force_docker(true)
            .options(Path::new("/ctx"));
        assert_eq!(options.cwd.as_deref(), Some(Path::new("/ctx")));
        assert_eq!(options.image.as_deref(), Some("cartesi/sdk:test"));
        assert!(options.force_docker);
    }
}
