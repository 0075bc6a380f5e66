//! Machine boot composition
//!
//! Merges the drive list, the root image metadata and the `[machine]`
//! section into the `cartesi-machine` command line, then boots it once to
//! store the snapshot.

use std::path::Path;

use crate::config::defaults::ROOT_DRIVE;
use crate::core::config::{Config, DriveConfig, DriveFormat};
use crate::core::image::ImageInfo;
use crate::error::{CartesiBuildError, MachineError};
use crate::infra::cartesi_machine;
use crate::infra::exec::ExecOptions;
use crate::infra::filesystem::{remove_path, set_executable};

const ROOTFSTYPE: &str = "rootfstype=";
const WORKDIR: &str = "WORKDIR=";

/// `--flash-drive` descriptor for drive `label`
///
/// Start and length are left for the emulator to compute.
pub fn flash_drive(label: &str, drive: &DriveConfig) -> String {
    let mut vars = vec![
        format!("label:{label}"),
        format!("filename:{}", drive.filename(label)),
    ];
    if let Some(mount) = &drive.mount {
        vars.push(format!("mount:{mount}"));
    }
    if let Some(user) = drive.user.as_deref().filter(|u| !u.is_empty()) {
        vars.push(format!("user:{user}"));
    }
    if drive.shared == Some(true) {
        vars.push("shared".to_string());
    }
    format!("--flash-drive={}", vars.join(","))
}

/// Kernel arguments after the squashfs root heuristic
///
/// A squashfs root needs `rootfstype=squashfs` unless the configuration
/// already names a type.
pub fn bootargs(config: &Config) -> Vec<String> {
    let mut args = config.machine.bootargs.clone();
    let sqfs_root = config
        .drives
        .get(ROOT_DRIVE)
        .and_then(DriveConfig::format)
        == Some(DriveFormat::Sqfs);
    if sqfs_root && !args.iter().any(|a| a.starts_with(ROOTFSTYPE)) {
        args.push(format!("{ROOTFSTYPE}squashfs"));
    }
    args
}

/// Entrypoint: explicit configuration first, then image ENTRYPOINT + CMD
pub fn entrypoint(config: &Config, info: Option<&ImageInfo>) -> Result<String, MachineError> {
    config
        .machine
        .entrypoint
        .clone()
        .or_else(|| info.and_then(ImageInfo::command_line))
        .filter(|e| !e.is_empty())
        .ok_or(MachineError::UndefinedEntrypoint)
}

/// Compose the `cartesi-machine` argument vector
pub fn compose(config: &Config, info: Option<&ImageInfo>) -> Result<Vec<String>, MachineError> {
    let entrypoint = entrypoint(config, info)?;
    let machine = &config.machine;
    let env = info.map(|i| i.env.as_slice()).unwrap_or_default();

    let bootargs = bootargs(config);
    let mut args: Vec<String> = bootargs
        .iter()
        .map(|arg| format!("--append-bootargs={arg}"))
        .collect();

    args.extend(env.iter().map(|var| format!("--append-init=export {var}")));

    args.extend(
        config
            .drives
            .iter()
            .map(|(label, drive)| flash_drive(label, drive)),
    );

    args.push(format!("--ram-image={}", machine.ram_image));
    args.push(format!("--ram-length={}", machine.ram_length));

    if let Some(workdir) = info.and_then(|i| i.workdir.as_deref()) {
        let already_set = bootargs
            .iter()
            .chain(env)
            .any(|a| a.starts_with(WORKDIR));
        if !already_set {
            args.push(format!("--append-init={WORKDIR}\"{workdir}\""));
        }
    }

    args.push(format!("--append-entrypoint={entrypoint}"));

    if machine.assert_rolling_template == Some(true) {
        args.push("--assert-rolling-template".to_string());
    }
    if machine.final_hash {
        args.push("--final-hash".to_string());
    }
    if machine.interactive == Some(true) {
        args.push("-it".to_string());
    }
    if machine.no_rollup == Some(true) {
        args.push("--no-rollup".to_string());
    }
    if let Some(max_mcycle) = machine.max_mcycle.filter(|&m| m > 0) {
        args.push(format!("--max-mcycle={max_mcycle}"));
    }
    if let Some(store) = machine.store.as_deref().filter(|s| !s.is_empty()) {
        args.push(format!("--store={store}"));
    }
    if let Some(user) = machine.user.as_deref().filter(|u| !u.is_empty()) {
        args.push(format!("--user={user}"));
    }

    Ok(args)
}

/// Boot the machine inside `destination`
///
/// Ctrl-C drops the running emulator (and any fallback container), removes
/// the partial snapshot and returns [`CartesiBuildError::Interrupted`].
pub async fn boot(
    config: &Config,
    info: Option<&ImageInfo>,
    destination: &Path,
) -> Result<(), CartesiBuildError> {
    let args = compose(config, info)?;
    tracing::debug!("cartesi-machine {}", args.join(" "));

    let options = ExecOptions::new()
        .with_cwd(destination)
        .with_image(&config.sdk)
        .inherit_stdio();
    let snapshot = config
        .machine
        .store
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| destination.join(s));

    tokio::select! {
        result = cartesi_machine::boot(&args, &options) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, tearing down machine");
            if let Some(snapshot) = &snapshot {
                remove_path(snapshot)?;
            }
            return Err(CartesiBuildError::Interrupted);
        }
    }

    if let Some(snapshot) = snapshot.filter(|s| s.exists()) {
        set_executable(&snapshot)?;
        tracing::info!("Snapshot stored at {}", snapshot.display());
    }
    Ok(())
}

/// Fail unless every drive image exists in `destination`
pub fn check_drives_built(config: &Config, destination: &Path) -> Result<(), MachineError> {
    for (name, drive) in &config.drives {
        if !destination.join(drive.filename(name)).is_file() {
            return Err(MachineError::DriveNotBuilt { name: name.clone() });
        }
    }
    Ok(())
}

/// Interactive variant of `config` running `command` in `/`
///
/// The session keeps no snapshot and prints no hash. With `run_as_root` the
/// command runs as `root`, otherwise as the emulator's default user.
pub fn shell_session(config: &Config, command: &str, run_as_root: bool) -> (Config, ImageInfo) {
    let mut config = config.clone();
    config.machine.entrypoint = None;
    config.machine.interactive = Some(true);
    config.machine.final_hash = false;
    config.machine.store = None;
    config.machine.user = run_as_root.then(|| "root".to_string());

    let info = ImageInfo {
        entrypoint: vec![command.to_string()],
        workdir: Some("/".to_string()),
        ..ImageInfo::default()
    };
    (config, info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Builder, EmptyDrive, EmptyDriveFormat, Mount};
    use tempfile::TempDir;

    fn image() -> ImageInfo {
        ImageInfo {
            cmd: vec!["python3".into(), "app.py".into()],
            entrypoint: vec!["rollup-init".into()],
            env: vec!["PATH=/usr/bin".into()],
            workdir: Some("/opt/app".into()),
            ..ImageInfo::default()
        }
    }

    fn sqfs_root() -> Config {
        Config::parse(
            r#"
            [drives.root]
            builder = "docker"
            format = "sqfs"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_compose_defaults_with_image() {
        let config = Config::default();
        let args = compose(&config, Some(&image())).unwrap();
        assert_eq!(
            args,
            vec![
                "--append-init=export PATH=/usr/bin".to_string(),
                "--flash-drive=label:root,filename:root.ext2".to_string(),
                format!("--ram-image={}", config.machine.ram_image),
                "--ram-length=128Mi".to_string(),
                "--append-init=WORKDIR=\"/opt/app\"".to_string(),
                "--append-entrypoint=rollup-init python3 app.py".to_string(),
                "--final-hash".to_string(),
                "--store=image".to_string(),
            ]
        );
    }

    #[test]
    fn test_undefined_entrypoint() {
        let config = Config::default();
        assert_eq!(
            compose(&config, None),
            Err(MachineError::UndefinedEntrypoint)
        );
        assert_eq!(
            compose(&config, Some(&ImageInfo::default())),
            Err(MachineError::UndefinedEntrypoint)
        );
    }

    #[test]
    fn test_explicit_entrypoint_wins() {
        let mut config = Config::default();
        config.machine.entrypoint = Some("/usr/bin/node index.js".into());
        let args = compose(&config, Some(&image())).unwrap();
        assert!(args.contains(&"--append-entrypoint=/usr/bin/node index.js".to_string()));
        assert!(!args.iter().any(|a| a.contains("python3")));

        let args = compose(&config, None).unwrap();
        assert!(args.contains(&"--append-entrypoint=/usr/bin/node index.js".to_string()));
    }

    #[test]
    fn test_rootfstype_heuristic() {
        let config = sqfs_root();
        let args = compose(&config, Some(&image())).unwrap();
        assert_eq!(args[0], "--append-bootargs=rootfstype=squashfs");
        assert!(args.contains(&"--flash-drive=label:root,filename:root.sqfs".to_string()));
    }

    #[test]
    fn test_rootfstype_never_overridden() {
        let mut config = sqfs_root();
        config.machine.bootargs = vec!["no4lvl".into(), "rootfstype=ext2".into()];
        let args = compose(&config, Some(&image())).unwrap();
        let bootargs: Vec<_> = args
            .iter()
            .filter(|a| a.starts_with("--append-bootargs="))
            .collect();
        assert_eq!(
            bootargs,
            vec![
                "--append-bootargs=no4lvl",
                "--append-bootargs=rootfstype=ext2"
            ]
        );
    }

    #[test]
    fn test_ext2_root_gets_no_rootfstype() {
        let args = compose(&Config::default(), Some(&image())).unwrap();
        assert!(!args.iter().any(|a| a.contains("rootfstype")));
    }

    #[test]
    fn test_workdir_not_injected_when_set() {
        let mut config = Config::default();
        config.machine.bootargs = vec!["WORKDIR=/srv".into()];
        let args = compose(&config, Some(&image())).unwrap();
        assert!(!args.iter().any(|a| a.starts_with("--append-init=WORKDIR")));

        let mut info = image();
        info.env.push("WORKDIR=/data".into());
        let args = compose(&Config::default(), Some(&info)).unwrap();
        assert!(!args.iter().any(|a| a.starts_with("--append-init=WORKDIR")));
    }

    #[test]
    fn test_flash_drive_descriptor() {
        let mut drive = DriveConfig {
            builder: Builder::Empty(EmptyDrive {
                format: EmptyDriveFormat::Raw,
                size: 4096,
            }),
            mount: None,
            shared: None,
            user: None,
        };
        assert_eq!(
            flash_drive("data", &drive),
            "--flash-drive=label:data,filename:data.raw"
        );

        drive.mount = Some(Mount::Path("/mnt/data".into()));
        drive.user = Some("dapp".into());
        drive.shared = Some(true);
        assert_eq!(
            flash_drive("data", &drive),
            "--flash-drive=label:data,filename:data.raw,mount:/mnt/data,user:dapp,shared"
        );

        drive.mount = Some(Mount::Flag(false));
        drive.user = None;
        drive.shared = Some(false);
        assert_eq!(
            flash_drive("data", &drive),
            "--flash-drive=label:data,filename:data.raw,mount:false"
        );
    }

    #[test]
    fn test_drives_in_name_order() {
        let config = Config::parse(
            r#"
            [drives.zeta]
            builder = "empty"
            size = 4096
            [drives.alpha]
            builder = "empty"
            size = 4096
            "#,
        )
        .unwrap();
        let args = compose(&config, Some(&image())).unwrap();
        let drives: Vec<_> = args
            .iter()
            .filter_map(|a| a.strip_prefix("--flash-drive=label:"))
            .map(|a| a.split(',').next().unwrap_or_default())
            .collect();
        assert_eq!(drives, vec!["alpha", "root", "zeta"]);
    }

    #[test]
    fn test_optional_flags() {
        let mut config = Config::default();
        config.machine.assert_rolling_template = Some(true);
        config.machine.no_rollup = Some(true);
        config.machine.max_mcycle = Some(u64::MAX);
        config.machine.user = Some("dapp".into());
        config.machine.final_hash = false;
        config.machine.store = None;

        let args = compose(&config, Some(&image())).unwrap();
        let tail = &args[args.len() - 4..];
        assert_eq!(
            tail,
            &[
                "--assert-rolling-template".to_string(),
                "--no-rollup".to_string(),
                format!("--max-mcycle={}", u64::MAX),
                "--user=dapp".to_string(),
            ]
        );
        assert!(!args.contains(&"--final-hash".to_string()));
    }

    #[test]
    fn test_zero_max_mcycle_is_omitted() {
        let mut config = Config::default();
        config.machine.max_mcycle = Some(0);

        let args = compose(&config, Some(&image())).unwrap();
        assert!(!args.iter().any(|a| a.starts_with("--max-mcycle")));
    }

    #[test]
    fn test_shell_session() {
        let mut config = Config::default();
        config.machine.entrypoint = Some("ignored".into());
        let (shell, info) = shell_session(&config, "/bin/bash", true);
        let args = compose(&shell, Some(&info)).unwrap();

        assert!(args.contains(&"--append-entrypoint=/bin/bash".to_string()));
        assert!(args.contains(&"--append-init=WORKDIR=\"/\"".to_string()));
        assert!(args.contains(&"-it".to_string()));
        assert!(args.contains(&"--user=root".to_string()));
        assert!(!args.contains(&"--final-hash".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--store")));

        let (shell, _) = shell_session(&config, "/bin/sh", false);
        assert_eq!(shell.machine.user, None);
    }

    #[test]
    fn test_check_drives_built() {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        assert_eq!(
            check_drives_built(&config, temp.path()),
            Err(MachineError::DriveNotBuilt {
                name: "root".into()
            })
        );

        std::fs::write(temp.path().join("root.ext2"), b"").unwrap();
        assert!(check_drives_built(&config, temp.path()).is_ok());
    }
}
