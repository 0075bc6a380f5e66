//! `directory` builder: encode a copy of a host directory

use std::path::Path;

use super::{artifact, exec_error, fs_error, require_source, Toolchain};
use crate::core::config::{DirectoryDrive, DriveFormat};
use crate::error::BuildError;
use crate::infra::filesystem::{copy_dir_all, CancelFlag, ScopedCleanup};
use crate::infra::{genext2fs, mksquashfs};

pub(super) async fn build(
    name: &str,
    drive: &DirectoryDrive,
    toolchain: &Toolchain,
    destination: &Path,
) -> Result<(), BuildError> {
    require_source(name, &drive.directory, true)?;

    let mut cleanup = ScopedCleanup::new();
    let staging = cleanup.track(destination.join(name));
    let output = cleanup.track(artifact(destination, name, drive.format.extension()));

    // Declared after the cleanup so it drops first: an aborted build stops
    // the blocking copy before the staging tree is removed.
    let cancel = CancelFlag::new();
    let _cancel_on_drop = cancel.drop_guard();

    let source = drive.directory.clone();
    let target = staging.clone();
    tokio::task::spawn_blocking(move || copy_dir_all(&source, &target, &cancel))
        .await
        .map_err(|e| BuildError::Io {
            drive: name.to_string(),
            path: staging.clone(),
            error: e.to_string(),
        })?
        .map_err(fs_error(name))?;

    let input = Path::new(name);
    let filename = format!("{name}.{}", drive.format);
    let options = toolchain.options(destination);
    let result = match drive.format {
        DriveFormat::Ext2 => {
            genext2fs::from_directory(drive.extra_size, input, Path::new(&filename), &options)
                .await
        }
        DriveFormat::Sqfs => {
            mksquashfs::from_directory(input, Path::new(&filename), &options).await
        }
    };
    result.map_err(exec_error(name))?;

    cleanup.keep(&output);
    Ok(())
}
