//! Doctor command logic
//!
//! Checks the external tools a build needs and reports issues with
//! suggestions. Encoders missing on the host are not fatal: builds run them
//! inside the toolchain image instead.

use std::path::Path;

use semver::Version;

use crate::config::defaults::CONFIG_FILE;
use crate::core::config::Config;
use crate::core::version::check_version_constraint;
use crate::infra::exec::ExecOptions;
use crate::infra::{cartesi_machine, crane, docker, genext2fs, mksquashfs};

/// Result of a single dependency check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the dependency being checked
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Version if available
    pub version: Option<String>,
    /// Error message if check failed
    pub error: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
    /// Whether this is a required or optional dependency
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    /// Create a failing check result
    pub fn fail(name: &str, error: &str, suggestion: Option<&str>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            version: None,
            error: Some(error.to_string()),
            suggestion: suggestion.map(String::from),
            required,
        }
    }
}

/// Overall doctor report
#[derive(Debug, Default)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Configuration issues found
    pub config_issues: Vec<String>,
}

impl DoctorReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check result
    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    /// Add a configuration issue
    pub fn add_config_issue(&mut self, issue: String) {
        self.config_issues.push(issue);
    }

    /// Check if all required checks passed
    pub fn all_required_passed(&self) -> bool {
        self.checks
            .iter()
            .filter(|c| c.required)
            .all(|c| c.passed)
            && self.config_issues.is_empty()
    }

    /// Check if all checks passed (including optional)
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed) && self.config_issues.is_empty()
    }

    /// Count passed checks
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Count failed checks
    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// Judge one tool from its lookup and reported version
///
/// A tool found on the host but reporting no parsable version passes with
/// an unknown version.
pub fn evaluate_tool(
    name: &str,
    installed: bool,
    version: Option<&Version>,
    requirement: Option<&str>,
    required: bool,
) -> CheckResult {
    if !installed {
        let suggestion = if required {
            format!("Install {name} and make sure it is in PATH")
        } else {
            format!("Install {name} locally, or let builds run it inside the toolchain image")
        };
        return CheckResult::fail(
            name,
            &format!("{name} not found in PATH"),
            Some(&suggestion),
            required,
        );
    }

    let Some(version) = version else {
        return CheckResult::pass(name, None, required);
    };

    match requirement.map(|r| check_version_constraint(version, r, name)) {
        Some(Err(e)) => CheckResult {
            version: Some(version.to_string()),
            ..CheckResult::fail(
                name,
                &e.to_string(),
                Some(&format!("Install a {name} release matching {}", requirement.unwrap_or_default())),
                required,
            )
        },
        _ => CheckResult::pass(name, Some(version.to_string()), required),
    }
}

fn installed(command: &str) -> bool {
    which::which(command).is_ok()
}

/// Check the container engine, required for docker drives and fallbacks
pub async fn check_docker() -> CheckResult {
    let found = installed(docker::COMMAND);
    let version = if found {
        docker::version(&ExecOptions::new()).await
    } else {
        None
    };
    evaluate_tool(docker::COMMAND, found, version.as_ref(), None, true)
}

/// Check the encoders and the emulator on the host
pub async fn check_tools() -> Vec<CheckResult> {
    let host = ExecOptions::new();
    let mut results = Vec::new();

    let found = installed(genext2fs::COMMAND);
    let version = if found { genext2fs::version(&host).await } else { None };
    results.push(evaluate_tool(
        genext2fs::COMMAND,
        found,
        version.as_ref(),
        Some(genext2fs::REQUIRED_VERSION),
        false,
    ));

    let found = installed(mksquashfs::COMMAND);
    let version = if found { mksquashfs::version(&host).await } else { None };
    results.push(evaluate_tool(
        mksquashfs::COMMAND,
        found,
        version.as_ref(),
        Some(mksquashfs::REQUIRED_VERSION),
        false,
    ));

    let found = installed(crane::COMMAND);
    let version = if found { crane::version(&host).await } else { None };
    results.push(evaluate_tool(
        crane::COMMAND,
        found,
        version.as_ref(),
        Some(crane::REQUIRED_VERSION),
        false,
    ));

    let found = installed(cartesi_machine::COMMAND);
    let version = if found {
        cartesi_machine::version(&host).await
    } else {
        None
    };
    results.push(evaluate_tool(
        cartesi_machine::COMMAND,
        found,
        version.as_ref(),
        Some(cartesi_machine::REQUIRED_VERSION),
        false,
    ));

    results
}

/// Check that the project's `cartesi.toml` parses
pub fn check_project_config(project_dir: &Path) -> Vec<String> {
    let path = project_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Vec::new();
    }
    match Config::load(&path) {
        Ok(_) => Vec::new(),
        Err(e) => vec![format!("{CONFIG_FILE}: {e}")],
    }
}

/// Run all doctor checks
pub async fn run_doctor(project_dir: Option<&Path>) -> DoctorReport {
    let mut report = DoctorReport::new();

    report.add_check(check_docker().await);
    for check in check_tools().await {
        report.add_check(check);
    }

    if let Some(dir) = project_dir {
        for issue in check_project_config(dir) {
            report.add_config_issue(issue);
        }
    }

    report
}
