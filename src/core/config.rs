//! Application configuration (cartesi.toml) parsing and validation
//!
//! The configuration declares a set of named drives plus the machine boot
//! parameters. Parsing walks the raw TOML value tree field by field so that
//! every violation is reported as a [`ConfigError`] naming the offending value.
//!
//! ```toml
//! sdk = "cartesi/sdk:0.12.0-alpha.0"
//!
//! [drives.root]
//! builder = "docker"
//! dockerfile = "Dockerfile"
//!
//! [drives.data]
//! builder = "empty"
//! size = "128Mi"
//! mount = "/mnt/data"
//!
//! [machine]
//! bootargs = ["no4lvl", "quiet"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::config::defaults::{
    default_ram_image, DEFAULT_CONTEXT, DEFAULT_DOCKERFILE, DEFAULT_RAM_LENGTH, DEFAULT_SDK,
    DEFAULT_STORE, ROOT_DRIVE,
};
use crate::core::bytes::parse_size;
use crate::error::ConfigError;

type Table = toml::map::Map<String, Value>;

/// Filesystem format of a built drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveFormat {
    /// ext2 filesystem built by `xgenext2fs`
    Ext2,
    /// squashfs filesystem built by `mksquashfs`
    Sqfs,
}

impl DriveFormat {
    /// File extension (and config spelling) of the format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ext2 => "ext2",
            Self::Sqfs => "sqfs",
        }
    }

    /// Infer the format of an existing image from its extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        match extension.as_str() {
            ".ext2" => Ok(Self::Ext2),
            ".sqfs" => Ok(Self::Sqfs),
            _ => Err(ConfigError::InvalidDriveFormat { value: extension }),
        }
    }
}

impl fmt::Display for DriveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Format of an `empty` drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyDriveFormat {
    /// Empty ext2 filesystem
    Ext2,
    /// Zero-filled unformatted image
    Raw,
}

impl EmptyDriveFormat {
    /// File extension of the format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ext2 => "ext2",
            Self::Raw => "raw",
        }
    }
}

/// Mount point of a drive inside the machine
///
/// A string selects the mount point, a boolean toggles the emulator default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    /// Explicit mount point
    Path(String),
    /// Mount (or not) at the emulator's default location
    Flag(bool),
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Flag(flag) => write!(f, "{flag}"),
        }
    }
}

/// Drive built by copying a host directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDrive {
    /// Source directory
    pub directory: PathBuf,
    /// Free space added to the filesystem, in bytes
    pub extra_size: u64,
    /// Output format
    pub format: DriveFormat,
}

/// Drive built from a container image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerDrive {
    /// Build context
    pub context: PathBuf,
    /// Dockerfile, relative to the working directory
    pub dockerfile: PathBuf,
    /// Free space added to the filesystem, in bytes
    pub extra_size: u64,
    /// Output format
    pub format: DriveFormat,
    /// Pre-built image to pull instead of building one
    pub image: Option<String>,
    /// Tags applied to the built image
    pub tags: Vec<String>,
    /// Multi-stage build target
    pub target: Option<String>,
}

/// Drive with no content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyDrive {
    /// Output format
    pub format: EmptyDriveFormat,
    /// Size in bytes
    pub size: u64,
}

/// Drive built from a tarball
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarDrive {
    /// Source tarball
    pub filename: PathBuf,
    /// Free space added to the filesystem, in bytes
    pub extra_size: u64,
    /// Output format
    pub format: DriveFormat,
}

/// Already-formatted image used as is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingDrive {
    /// Source image
    pub filename: PathBuf,
    /// Format inferred from the filename extension
    pub format: DriveFormat,
}

/// Strategy used to produce a drive image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builder {
    /// `builder = "directory"`
    Directory(DirectoryDrive),
    /// `builder = "docker"`
    Docker(DockerDrive),
    /// `builder = "empty"`
    Empty(EmptyDrive),
    /// `builder = "tar"`
    Tar(TarDrive),
    /// `builder = "none"`
    Existing(ExistingDrive),
}

impl Builder {
    /// Builder name as spelled in the configuration
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Directory(_) => "directory",
            Self::Docker(_) => "docker",
            Self::Empty(_) => "empty",
            Self::Tar(_) => "tar",
            Self::Existing(_) => "none",
        }
    }
}

/// Configuration of one drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveConfig {
    /// Build strategy and its fields
    pub builder: Builder,
    /// Mount point (default given by the emulator)
    pub mount: Option<Mount>,
    /// Whether writes go back to the image file (default given by the emulator)
    pub shared: Option<bool>,
    /// Owner of the mount (default given by the emulator)
    pub user: Option<String>,
}

impl DriveConfig {
    /// Extension of the produced image
    pub fn extension(&self) -> &'static str {
        match &self.builder {
            Builder::Directory(d) => d.format.extension(),
            Builder::Docker(d) => d.format.extension(),
            Builder::Empty(d) => d.format.extension(),
            Builder::Tar(d) => d.format.extension(),
            Builder::Existing(d) => d.format.extension(),
        }
    }

    /// Filesystem format, if the drive holds one
    pub fn format(&self) -> Option<DriveFormat> {
        match &self.builder {
            Builder::Directory(d) => Some(d.format),
            Builder::Docker(d) => Some(d.format),
            Builder::Empty(d) => match d.format {
                EmptyDriveFormat::Ext2 => Some(DriveFormat::Ext2),
                EmptyDriveFormat::Raw => None,
            },
            Builder::Tar(d) => Some(d.format),
            Builder::Existing(d) => Some(d.format),
        }
    }

    /// Name of the image file produced for drive `name`
    pub fn filename(&self, name: &str) -> String {
        format!("{name}.{}", self.extension())
    }

    /// Default root drive: docker build of `./Dockerfile` into ext2
    pub fn default_root() -> Self {
        Self {
            builder: Builder::Docker(DockerDrive {
                context: PathBuf::from(DEFAULT_CONTEXT),
                dockerfile: PathBuf::from(DEFAULT_DOCKERFILE),
                extra_size: 0,
                format: DriveFormat::Ext2,
                image: None,
                tags: Vec::new(),
                target: None,
            }),
            mount: None,
            shared: None,
            user: None,
        }
    }
}

/// Machine boot parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Assert the rollup template state at the end of the boot
    pub assert_rolling_template: Option<bool>,
    /// Extra kernel command line arguments
    pub bootargs: Vec<String>,
    /// Explicit entrypoint, overrides the image ENTRYPOINT/CMD
    pub entrypoint: Option<String>,
    /// Print the final machine hash
    pub final_hash: bool,
    /// Attach the terminal (only set by `shell`)
    pub interactive: Option<bool>,
    /// Cycle limit
    pub max_mcycle: Option<u64>,
    /// Run without the rollup device
    pub no_rollup: Option<bool>,
    /// RAM length (e.g. `128Mi`)
    pub ram_length: String,
    /// Kernel image
    pub ram_image: String,
    /// Snapshot directory, relative to the context directory
    pub store: Option<String>,
    /// User the entrypoint runs as
    pub user: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            assert_rolling_template: None,
            bootargs: Vec::new(),
            entrypoint: None,
            final_hash: true,
            interactive: None,
            max_mcycle: None,
            no_rollup: None,
            ram_length: DEFAULT_RAM_LENGTH.to_string(),
            ram_image: default_ram_image().to_string(),
            store: Some(DEFAULT_STORE.to_string()),
            user: None,
        }
    }
}

/// Parsed application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Drives by name, always containing `root`
    pub drives: BTreeMap<String, DriveConfig>,
    /// Machine parameters
    pub machine: MachineConfig,
    /// Toolchain image
    pub sdk: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut drives = BTreeMap::new();
        drives.insert(ROOT_DRIVE.to_string(), DriveConfig::default_root());
        Self {
            drives,
            machine: MachineConfig::default(),
            sdk: DEFAULT_SDK.to_string(),
        }
    }
}

impl Config {
    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let table: Table = toml::from_str(content).map_err(|e| ConfigError::Syntax {
            message: e.to_string(),
        })?;

        Ok(Self {
            drives: parse_drives(table.get("drives"))?,
            machine: parse_machine(table.get("machine"))?,
            sdk: parse_string(table.get("sdk"), DEFAULT_SDK)?,
        })
    }

    /// Load configuration from a file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// The root drive
    pub fn root(&self) -> Option<&DriveConfig> {
        self.drives.get(ROOT_DRIVE)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(value: Option<&Value>, default: bool) -> Result<bool, ConfigError> {
    Ok(parse_optional_bool(value)?.unwrap_or(default))
}

fn parse_optional_bool(value: Option<&Value>) -> Result<Option<bool>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(ConfigError::InvalidBoolean {
            value: render(other),
        }),
    }
}

fn parse_string(value: Option<&Value>, default: &str) -> Result<String, ConfigError> {
    Ok(parse_optional_string(value)?.unwrap_or_else(|| default.to_string()))
}

fn parse_optional_string(value: Option<&Value>) -> Result<Option<String>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigError::InvalidString {
            value: render(other),
        }),
    }
}

fn parse_required_string(value: Option<&Value>, field: &str) -> Result<String, ConfigError> {
    parse_optional_string(value)?.ok_or_else(|| ConfigError::RequiredField {
        field: field.to_string(),
    })
}

fn parse_string_array(value: Option<&Value>) -> Result<Vec<String>, ConfigError> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ConfigError::InvalidString {
                    value: render(other),
                }),
            })
            .collect(),
        Some(other) => Err(ConfigError::InvalidStringArray {
            value: render(other),
        }),
    }
}

fn parse_optional_number(value: Option<&Value>) -> Result<Option<u64>, ConfigError> {
    let invalid = |v: &Value| ConfigError::InvalidNumber { value: render(v) };
    match value {
        None => Ok(None),
        Some(v @ Value::Integer(i)) => u64::try_from(*i).map(Some).map_err(|_| invalid(v)),
        // Integers beyond i64 can only be written as strings
        Some(v @ Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid(v)),
        Some(other) => Err(invalid(other)),
    }
}

fn parse_bytes(value: Option<&Value>, default: u64) -> Result<u64, ConfigError> {
    let invalid = |v: &Value| ConfigError::InvalidBytes { value: render(v) };
    match value {
        None => Ok(default),
        Some(v @ Value::Integer(i)) => u64::try_from(*i).map_err(|_| invalid(v)),
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss
        )]
        Some(v @ Value::Float(f)) if f.is_finite() && *f >= 0.0 => {
            if *f >= u64::MAX as f64 {
                Err(invalid(v))
            } else {
                Ok(f.floor() as u64)
            }
        }
        Some(v @ Value::String(s)) => parse_size(s).ok_or_else(|| invalid(v)),
        Some(other) => Err(invalid(other)),
    }
}

fn parse_mount(value: Option<&Value>) -> Result<Option<Mount>, ConfigError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(Mount::Path(s.clone()))),
        Some(Value::Boolean(b)) => Ok(Some(Mount::Flag(*b))),
        Some(other) => Err(ConfigError::InvalidString {
            value: render(other),
        }),
    }
}

fn parse_format(value: Option<&Value>) -> Result<DriveFormat, ConfigError> {
    match value {
        None => Ok(DriveFormat::Ext2),
        Some(Value::String(s)) if s == "ext2" => Ok(DriveFormat::Ext2),
        Some(Value::String(s)) if s == "sqfs" => Ok(DriveFormat::Sqfs),
        Some(other) => Err(ConfigError::InvalidDriveFormat {
            value: render(other),
        }),
    }
}

fn parse_empty_format(value: Option<&Value>) -> Result<EmptyDriveFormat, ConfigError> {
    match value {
        None => Ok(EmptyDriveFormat::Ext2),
        Some(Value::String(s)) if s == "ext2" => Ok(EmptyDriveFormat::Ext2),
        Some(Value::String(s)) if s == "raw" => Ok(EmptyDriveFormat::Raw),
        Some(other) => Err(ConfigError::InvalidEmptyDriveFormat {
            value: render(other),
        }),
    }
}

fn extra_size(table: &Table) -> Result<u64, ConfigError> {
    parse_bytes(
        table.get("extra-size").or_else(|| table.get("extraSize")),
        0,
    )
}

fn parse_builder(table: &Table) -> Result<Builder, ConfigError> {
    let kind = match table.get("builder") {
        None => "docker",
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(ConfigError::InvalidBuilder {
                value: render(other),
            })
        }
    };

    match kind {
        "directory" => Ok(Builder::Directory(DirectoryDrive {
            directory: parse_required_string(table.get("directory"), "directory")?.into(),
            extra_size: extra_size(table)?,
            format: parse_format(table.get("format"))?,
        })),
        "docker" => Ok(Builder::Docker(DockerDrive {
            context: parse_string(table.get("context"), DEFAULT_CONTEXT)?.into(),
            dockerfile: parse_string(table.get("dockerfile"), DEFAULT_DOCKERFILE)?.into(),
            extra_size: extra_size(table)?,
            format: parse_format(table.get("format"))?,
            image: parse_optional_string(table.get("image"))?,
            tags: parse_string_array(table.get("tags"))?,
            target: parse_optional_string(table.get("target"))?,
        })),
        "empty" => Ok(Builder::Empty(EmptyDrive {
            format: parse_empty_format(table.get("format"))?,
            size: parse_bytes(table.get("size"), 0)?,
        })),
        "tar" => Ok(Builder::Tar(TarDrive {
            filename: parse_required_string(table.get("filename"), "filename")?.into(),
            extra_size: extra_size(table)?,
            format: parse_format(table.get("format"))?,
        })),
        "none" => {
            let filename = PathBuf::from(parse_required_string(table.get("filename"), "filename")?);
            let format = DriveFormat::from_path(&filename)?;
            Ok(Builder::Existing(ExistingDrive { filename, format }))
        }
        other => Err(ConfigError::InvalidBuilder {
            value: other.to_string(),
        }),
    }
}

fn parse_drive(value: &Value) -> Result<DriveConfig, ConfigError> {
    // Anything that is not a table is read as an empty one
    let empty = Table::new();
    let table = value.as_table().unwrap_or(&empty);

    Ok(DriveConfig {
        builder: parse_builder(table)?,
        mount: parse_mount(table.get("mount"))?,
        shared: parse_optional_bool(table.get("shared"))?,
        user: parse_optional_string(table.get("user"))?,
    })
}

fn parse_drives(value: Option<&Value>) -> Result<BTreeMap<String, DriveConfig>, ConfigError> {
    let mut drives = BTreeMap::new();

    if let Some(table) = value.and_then(Value::as_table) {
        for (name, drive) in table {
            drives.insert(name.clone(), parse_drive(drive)?);
        }
    }

    if !drives.contains_key(ROOT_DRIVE) {
        drives.insert(ROOT_DRIVE.to_string(), DriveConfig::default_root());
    }

    Ok(drives)
}

fn parse_machine(value: Option<&Value>) -> Result<MachineConfig, ConfigError> {
    let Some(value) = value else {
        return Ok(MachineConfig::default());
    };
    let Some(table) = value.as_table() else {
        return Err(ConfigError::InvalidMachine {
            value: render(value),
        });
    };

    Ok(MachineConfig {
        assert_rolling_template: parse_optional_bool(table.get("assert-rolling-template"))?,
        bootargs: parse_string_array(table.get("bootargs"))?,
        entrypoint: parse_optional_string(table.get("entrypoint"))?,
        final_hash: parse_bool(table.get("final-hash"), true)?,
        interactive: None,
        max_mcycle: parse_optional_number(table.get("max-mcycle"))?,
        no_rollup: parse_optional_bool(table.get("no-rollup"))?,
        ram_length: parse_string(table.get("ram-length"), DEFAULT_RAM_LENGTH)?,
        ram_image: parse_string(table.get("ram-image"), default_ram_image())?,
        store: Some(DEFAULT_STORE.to_string()),
        user: parse_optional_string(table.get("user"))?,
    })
}
