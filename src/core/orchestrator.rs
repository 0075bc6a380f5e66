//! Build orchestration
//!
//! Loads `cartesi.toml`, builds every drive concurrently into the context
//! directory, then boots the machine once to store the snapshot.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use crate::config::defaults::{CONFIG_FILE, CONTEXT_DIR, ROOT_DRIVE};
use crate::core::builder::{self, DriveResult, Toolchain};
use crate::core::config::{Builder, Config};
use crate::core::machine;
use crate::error::{CartesiBuildError, ConfigError, MachineError};
use crate::infra::filesystem::{create_dir_all, remove_path};

/// Build options
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Stop after the drives are built
    pub skip_snapshot: bool,
    /// Build only these drives (and never boot)
    pub drives: Vec<String>,
    /// Run every encoder inside the toolchain image
    pub force_docker: bool,
}

/// Outcome of a build
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// Built drives by name
    pub drives: BTreeMap<String, DriveResult>,
    /// Snapshot directory, when the machine was booted
    pub snapshot: Option<PathBuf>,
}

/// Stage reported to the progress callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStage {
    /// These drives are being built
    Drives(Vec<String>),
    /// Drives are done and the machine is about to boot
    Snapshot,
}

/// Progress callback type for build stage reporting
pub type ProgressCallback = Box<dyn Fn(&BuildStage) + Send + Sync>;

/// `<project>/.cartesi`
pub fn context_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(CONTEXT_DIR)
}

/// `<project>/cartesi.toml`
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE)
}

/// Load the project configuration with source paths anchored at the project
pub fn load_config(project_dir: &Path) -> Result<Config, ConfigError> {
    let mut config = Config::load(&config_path(project_dir))?;
    resolve_sources(&mut config, project_dir);
    Ok(config)
}

/// Make relative drive sources relative to `base` instead of the process
fn resolve_sources(config: &mut Config, base: &Path) {
    for drive in config.drives.values_mut() {
        match &mut drive.builder {
            Builder::Directory(d) => d.directory = base.join(&d.directory),
            Builder::Docker(d) => {
                d.context = base.join(&d.context);
                d.dockerfile = base.join(&d.dockerfile);
            }
            Builder::Tar(d) => d.filename = base.join(&d.filename),
            Builder::Existing(d) => d.filename = base.join(&d.filename),
            Builder::Empty(_) => {}
        }
    }
}

/// Restrict `config` to the named drives
pub fn select_drives(config: &Config, names: &[String]) -> Result<Config, ConfigError> {
    if names.is_empty() {
        return Ok(config.clone());
    }
    let mut selected = config.clone();
    selected.drives = names
        .iter()
        .map(|name| {
            config
                .drives
                .get(name)
                .map(|drive| (name.clone(), drive.clone()))
                .ok_or_else(|| ConfigError::UnknownDrive { name: name.clone() })
        })
        .collect::<Result<_, _>>()?;
    Ok(selected)
}

/// Fail early when no entrypoint can come out of the build
///
/// Only a docker root drive can supply ENTRYPOINT/CMD, so any other root
/// needs `machine.entrypoint`.
pub fn check_entrypoint(config: &Config) -> Result<(), MachineError> {
    let docker_root = matches!(
        config.drives.get(ROOT_DRIVE).map(|d| &d.builder),
        Some(Builder::Docker(_))
    );
    if config.machine.entrypoint.is_none() && !docker_root {
        return Err(MachineError::UndefinedEntrypoint);
    }
    Ok(())
}

/// Build every drive of `config` concurrently
///
/// The first failure aborts the remaining builds. Aborted builds drop their
/// cleanup guards and child processes before this returns.
pub async fn build_all(
    config: &Config,
    toolchain: &Toolchain,
    destination: &Path,
) -> Result<BTreeMap<String, DriveResult>, CartesiBuildError> {
    let mut set = JoinSet::new();
    let mut names = HashMap::new();

    for (name, drive) in &config.drives {
        let name = name.clone();
        let drive = drive.clone();
        let toolchain = toolchain.clone();
        let destination = destination.to_path_buf();
        let task_name = name.clone();
        let handle = set.spawn(async move {
            builder::build(&task_name, &drive, &toolchain, &destination).await
        });
        names.insert(handle.id(), name);
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = set.join_next_with_id().await {
        let outcome = match joined {
            Ok((id, Ok(result))) => {
                let name = names.remove(&id).unwrap_or_default();
                results.insert(name, result);
                continue;
            }
            Ok((_, Err(e))) => CartesiBuildError::Build(e),
            Err(e) => CartesiBuildError::Task {
                drive: names.remove(&e.id()).unwrap_or_default(),
                message: e.to_string(),
            },
        };
        tracing::debug!("Aborting remaining drive builds: {outcome}");
        set.shutdown().await;
        return Err(outcome);
    }

    Ok(results)
}

/// Boot the machine over the built drives and store the snapshot
pub async fn snapshot(
    config: &Config,
    drives: &BTreeMap<String, DriveResult>,
    destination: &Path,
) -> Result<Option<PathBuf>, CartesiBuildError> {
    let info = drives.get(ROOT_DRIVE).and_then(|r| r.image_info.as_ref());
    let snapshot = config
        .machine
        .store
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| destination.join(s));

    if let Some(snapshot) = &snapshot {
        remove_path(snapshot)?;
    }
    machine::boot(config, info, destination).await?;
    Ok(snapshot)
}

/// Build the project in `project_dir`
///
/// # Arguments
/// * `project_dir` - Directory holding `cartesi.toml`
/// * `options` - Drive selection and snapshot settings
/// * `progress` - Optional callback told about each stage
pub async fn run(
    project_dir: &Path,
    options: &BuildOptions,
    progress: Option<ProgressCallback>,
) -> Result<BuildSummary, CartesiBuildError> {
    let report = |stage: BuildStage| {
        if let Some(cb) = &progress {
            cb(&stage);
        }
    };

    let config = load_config(project_dir)?;
    let config = select_drives(&config, &options.drives)?;
    let boot = !options.skip_snapshot && options.drives.is_empty();
    if boot {
        check_entrypoint(&config)?;
    }

    let destination = context_dir(project_dir);
    create_dir_all(&destination)?;
    tracing::info!("Building into {}", destination.display());

    let toolchain = Toolchain::new(&config.sdk).force_docker(options.force_docker);
    report(BuildStage::Drives(config.drives.keys().cloned().collect()));
    let drives = build_all(&config, &toolchain, &destination).await?;

    let snapshot = if boot {
        report(BuildStage::Snapshot);
        snapshot(&config, &drives, &destination).await?
    } else {
        None
    };

    Ok(BuildSummary { drives, snapshot })
}
