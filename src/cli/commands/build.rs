//! Build command implementation
//!
//! Implements `cartesi-build build`: drives first, then the snapshot.

use std::path::Path;

use anyhow::Result;

use crate::cli::output::{create_spinner, is_json, print_detail, print_success};
use crate::core::orchestrator::{context_dir, run, BuildOptions, BuildStage, ProgressCallback};

/// Execute the build command
pub async fn execute(project_dir: &Path, options: BuildOptions) -> Result<()> {
    let spinner = create_spinner("Loading cartesi.toml");
    let bar = spinner.clone();
    // The boot owns the terminal, so the spinner goes away before it
    let progress: ProgressCallback = Box::new(move |stage: &BuildStage| match stage {
        BuildStage::Drives(names) => {
            bar.set_message(format!("Building drives: {}", names.join(", ")));
        }
        BuildStage::Snapshot => bar.finish_and_clear(),
    });

    let result = run(project_dir, &options, Some(progress)).await;
    spinner.finish_and_clear();
    let summary = result?;

    if is_json() {
        let json = serde_json::json!({
            "status": "success",
            "drives": summary
                .drives
                .iter()
                .map(|(name, d)| (name.clone(), serde_json::json!(d.filename)))
                .collect::<serde_json::Map<_, _>>(),
            "snapshot": summary.snapshot.as_ref().map(|s| s.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let destination = context_dir(project_dir);
    print_success(&format!("Built {} drive(s)", summary.drives.len()));
    for (name, drive) in &summary.drives {
        print_detail(&format!("{name}: {}", destination.join(&drive.filename).display()));
    }
    if let Some(stored) = summary.snapshot {
        print_success(&format!("Snapshot stored at {}", stored.display()));
    }
    Ok(())
}
