//! `none` builder: copy an already-formatted image

use std::path::Path;

use super::{artifact, fs_error, require_source};
use crate::core::config::ExistingDrive;
use crate::error::BuildError;
use crate::infra::filesystem::{copy_file, ScopedCleanup};

pub(super) fn build(
    name: &str,
    drive: &ExistingDrive,
    destination: &Path,
) -> Result<(), BuildError> {
    require_source(name, &drive.filename, false)?;

    let mut cleanup = ScopedCleanup::new();
    let output = cleanup.track(artifact(destination, name, drive.format.extension()));
    copy_file(&drive.filename, &output).map_err(fs_error(name))?;
    cleanup.keep(&output);
    Ok(())
}
