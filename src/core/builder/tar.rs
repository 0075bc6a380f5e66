//! `tar` builder: encode a tarball

use std::path::Path;

use super::{artifact, exec_error, fs_error, require_source, Toolchain};
use crate::core::config::{DriveFormat, TarDrive};
use crate::error::BuildError;
use crate::infra::filesystem::{copy_file, ScopedCleanup};
use crate::infra::{genext2fs, mksquashfs};

pub(super) async fn build(
    name: &str,
    drive: &TarDrive,
    toolchain: &Toolchain,
    destination: &Path,
) -> Result<(), BuildError> {
    require_source(name, &drive.filename, false)?;

    let mut cleanup = ScopedCleanup::new();
    let tar = cleanup.track(artifact(destination, name, "tar"));
    let output = cleanup.track(artifact(destination, name, drive.format.extension()));
    copy_file(&drive.filename, &tar).map_err(fs_error(name))?;

    encode_tar(name, drive.format, drive.extra_size, toolchain, destination).await?;

    cleanup.keep(&output);
    Ok(())
}

/// Encode `<name>.tar` into `<name>.<format>`, both inside `destination`
///
/// Paths handed to the encoders are relative so they resolve the same way
/// on the host and inside the toolchain container.
pub(super) async fn encode_tar(
    name: &str,
    format: DriveFormat,
    extra_size: u64,
    toolchain: &Toolchain,
    destination: &Path,
) -> Result<(), BuildError> {
    let tar = format!("{name}.tar");
    let output = format!("{name}.{format}");
    let options = toolchain.options(destination);

    let result = match format {
        DriveFormat::Ext2 => {
            genext2fs::from_tar(extra_size, Path::new(&tar), Path::new(&output), &options).await
        }
        DriveFormat::Sqfs => {
            mksquashfs::from_tar(&destination.join(&tar), Path::new(&output), &options).await
        }
    };
    result.map(|_| ()).map_err(exec_error(name))
}
