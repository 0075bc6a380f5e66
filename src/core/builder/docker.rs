//! `docker` builder: export a riscv64 container image
//!
//! The image is pulled (when `image` is set) or built with buildx, inspected,
//! saved as an OCI tarball, flattened to a rootfs tarball by `crane` and
//! finally encoded like a `tar` drive.

use std::path::Path;

use super::tar::encode_tar;
use super::{artifact, exec_error, Toolchain};
use crate::core::config::DockerDrive;
use crate::core::image::ImageInfo;
use crate::error::BuildError;
use crate::infra::exec::ExecOptions;
use crate::infra::filesystem::ScopedCleanup;
use crate::infra::{crane, docker};

pub(super) async fn build(
    name: &str,
    drive: &DockerDrive,
    toolchain: &Toolchain,
    destination: &Path,
) -> Result<ImageInfo, BuildError> {
    let mut cleanup = ScopedCleanup::new();
    let host = ExecOptions::new();

    let image = match &drive.image {
        Some(image) => {
            tracing::debug!("Pulling {image}");
            docker::pull(image, &host).await.map_err(exec_error(name))?;
            image.clone()
        }
        None => build_image(name, drive, &mut cleanup, destination).await?,
    };

    let json = docker::inspect(&image, &host)
        .await
        .map_err(exec_error(name))?;
    let info = ImageInfo::from_inspect(&image, &json)?;

    let oci = cleanup.track(artifact(destination, name, "oci.tar"));
    let tar = cleanup.track(artifact(destination, name, "tar"));
    let output = cleanup.track(artifact(destination, name, drive.format.extension()));

    docker::save(&image, &oci, &host)
        .await
        .map_err(exec_error(name))?;

    crane::export_image(&oci, &tar, &toolchain.options(destination))
        .await
        .map_err(exec_error(name))?;

    encode_tar(name, drive.format, drive.extra_size, toolchain, destination).await?;

    cleanup.keep(&output);
    Ok(info)
}

/// Build the image with buildx and return its id
async fn build_image(
    name: &str,
    drive: &DockerDrive,
    cleanup: &mut ScopedCleanup,
    destination: &Path,
) -> Result<String, BuildError> {
    let iidfile = cleanup.track(artifact(destination, name, "iid"));
    let context = drive.context.display().to_string();
    let dockerfile = drive.dockerfile.display().to_string();
    let options = docker::BuildOptions {
        context: &context,
        dockerfile: &dockerfile,
        tags: &drive.tags,
        target: drive.target.as_deref(),
    };

    docker::build(&options, &iidfile, &ExecOptions::new())
        .await
        .map_err(exec_error(name))?;

    let id = std::fs::read_to_string(&iidfile).map_err(|e| BuildError::Io {
        drive: name.to_string(),
        path: iidfile.clone(),
        error: e.to_string(),
    })?;
    Ok(id.trim().to_string())
}
