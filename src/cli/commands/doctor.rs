//! CLI command for `cartesi-build doctor`
//!
//! Checks system dependencies and reports issues with suggestions.

use anyhow::Result;
use std::path::Path;

use crate::cli::output::{
    is_json, is_quiet, print_detail, print_info, print_success, print_warning, status,
};
use crate::core::doctor::run_doctor;

/// Execute the doctor command
pub async fn execute(project_dir: Option<&Path>) -> Result<()> {
    let report = run_doctor(project_dir).await;

    if is_json() {
        let status = if report.all_passed() {
            "success"
        } else if report.all_required_passed() {
            "warning"
        } else {
            "error"
        };
        let json_result = serde_json::json!({
            "status": status,
            "checks": report.checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "passed": c.passed,
                "required": c.required,
                "version": c.version,
                "error": c.error,
                "suggestion": c.suggestion
            })).collect::<Vec<_>>(),
            "config_issues": report.config_issues,
            "passed_count": report.passed_count(),
            "total_count": report.checks.len()
        });
        println!("{}", serde_json::to_string_pretty(&json_result)?);

        if !report.all_required_passed() {
            anyhow::bail!("Missing required dependencies");
        }
        return Ok(());
    }

    if is_quiet() {
        for check in report.checks.iter().filter(|c| c.required && !c.passed) {
            eprintln!("{} Missing required: {}", status::ERROR, check.name);
        }
        if !report.all_required_passed() {
            anyhow::bail!("Missing required dependencies");
        }
        return Ok(());
    }

    print_info("Checking system dependencies...");
    println!();

    for check in &report.checks {
        let version_str = check
            .version
            .as_ref()
            .map(|v| format!(" (v{v})"))
            .unwrap_or_default();
        let required_str = if check.required { "" } else { " [optional]" };

        if check.passed {
            println!("  {} {}{version_str}{required_str}", status::SUCCESS, check.name);
        } else {
            println!("  {} {}{required_str}", status::ERROR, check.name);
            if let Some(error) = &check.error {
                print_detail(&format!("Error: {error}"));
            }
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("Suggestion: {suggestion}"));
            }
        }
    }

    if !report.config_issues.is_empty() {
        println!();
        print_warning("Configuration issues:");
        for issue in &report.config_issues {
            print_detail(&format!("• {issue}"));
        }
    }

    println!();
    let passed = report.passed_count();
    let total = report.checks.len();

    if report.all_passed() {
        print_success(&format!("All checks passed ({passed}/{total})"));
    } else if report.all_required_passed() {
        print_warning(&format!(
            "{passed}/{total} checks passed, missing tools will run inside the SDK image"
        ));
    } else {
        println!("{} {passed}/{total} checks passed", status::ERROR);
        anyhow::bail!("Missing required dependencies. Run 'cartesi-build doctor' for details.");
    }

    Ok(())
}
