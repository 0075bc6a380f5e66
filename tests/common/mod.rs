//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test project context
///
/// Creates a temporary directory for test projects and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a project with the given `cartesi.toml`
    pub fn with_config(config: &str) -> Self {
        let project = Self::new();
        project.create_file("cartesi.toml", config);
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Path of a file inside the context directory
    pub fn context_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(".cartesi").join(name)
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        self.create_binary(name, content.as_bytes());
    }

    /// Create a file with arbitrary bytes in the test project
    pub fn create_binary(&self, name: &str, content: &[u8]) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the test project
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Run the binary inside the project
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cartesi-build"))
            .current_dir(self.path())
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute cartesi-build")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `command` is installed on this host
pub fn tool_available(command: &str) -> bool {
    which::which(command).is_ok()
}

/// Stdout of a finished command
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr of a finished command
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Configuration whose drives need no external tool
pub const RAW_CONFIG: &str = r#"
[drives.root]
builder = "none"
filename = "rootfs.ext2"

[drives.data]
builder = "empty"
format = "raw"
size = "16Ki"
mount = "/mnt/data"

[machine]
entrypoint = "/bin/true"
"#;
