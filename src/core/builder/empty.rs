//! `empty` builder: blank ext2 filesystem or zero-filled raw image

use std::path::Path;

use super::{artifact, exec_error, fs_error, Toolchain};
use crate::core::config::{EmptyDrive, EmptyDriveFormat};
use crate::error::BuildError;
use crate::infra::filesystem::{write_zeroed, ScopedCleanup};
use crate::infra::genext2fs;

pub(super) async fn build(
    name: &str,
    drive: &EmptyDrive,
    toolchain: &Toolchain,
    destination: &Path,
) -> Result<(), BuildError> {
    let mut cleanup = ScopedCleanup::new();
    let output = cleanup.track(artifact(destination, name, drive.format.extension()));

    match drive.format {
        EmptyDriveFormat::Ext2 => {
            let filename = format!("{name}.{}", drive.format.extension());
            genext2fs::empty(drive.size, Path::new(&filename), &toolchain.options(destination))
                .await
                .map_err(exec_error(name))?;
        }
        EmptyDriveFormat::Raw => {
            write_zeroed(&output, drive.size).map_err(fs_error(name))?;
        }
    }

    cleanup.keep(&output);
    Ok(())
}
