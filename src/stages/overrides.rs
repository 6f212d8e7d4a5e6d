use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::batch::{run_stage, Outcome, StageProcessor};
use crate::config::Config;
use crate::error::CollectError;
use crate::workspace::{self, WorkingCopy};

/// Copies override `.tf` files into the root of every working copy.
///
/// Sources are applied in order, so a file from a later source replaces a
/// same-named file from an earlier one.
pub struct OverrideStage {
    sources: Vec<PathBuf>,
}

impl OverrideStage {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self { sources }
    }

    fn copy_overrides(&self, repo_dir: &Path) -> crate::error::Result<Vec<String>> {
        let mut copied = Vec::new();

        for source in &self.sources {
            for file in find_override_files(source)? {
                let Some(file_name) = file.file_name() else {
                    continue;
                };
                let dest = repo_dir.join(file_name);
                copy_preserving_mtime(&file, &dest)?;
                debug!("Copied {} to {}", file.display(), dest.display());
                copied.push(file_name.to_string_lossy().into_owned());
            }
        }

        Ok(copied)
    }
}

/// Top-level `.tf` files of `dir`, sorted by name. A missing directory has none.
fn find_override_files(dir: &Path) -> crate::error::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!("Override directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && workspace::is_terraform_file(&path) {
            files.push(path);
        }
    }
    files.sort();

    debug!("Found {} .tf files in {}", files.len(), dir.display());
    Ok(files)
}

/// Copies contents and permissions, then the modification time.
///
/// A read-only destination left by an earlier copy is replaced rather than
/// opened for writing.
fn copy_preserving_mtime(src: &Path, dest: &Path) -> std::io::Result<()> {
    if let Ok(existing) = fs::symlink_metadata(dest) {
        if existing.is_file() && existing.permissions().readonly() {
            fs::remove_file(dest)?;
        }
    }

    fs::copy(src, dest)?;
    let modified = fs::metadata(src)?.modified()?;
    // futimens needs ownership, not write access
    File::open(dest)?.set_modified(modified)
}

#[async_trait]
impl StageProcessor for OverrideStage {
    type Item = WorkingCopy;

    fn name(&self) -> &'static str {
        "Override"
    }

    async fn process(&self, copy: &WorkingCopy) -> Outcome {
        if !copy.path.is_dir() {
            let err = CollectError::MissingWorkingCopy(copy.path.display().to_string());
            return Outcome::Failed(err.to_string());
        }

        info!("Processing repository: {copy}");

        match self.copy_overrides(&copy.path) {
            Ok(copied) if copied.is_empty() => {
                info!("No override files found to copy to {copy}");
                Outcome::Success
            }
            Ok(copied) => {
                info!(
                    "Copied {} override files to {copy}: {}",
                    copied.len(),
                    copied.join(", ")
                );
                Outcome::Success
            }
            Err(e) => Outcome::Failed(format!("Failed to copy override files into {copy}: {e}")),
        }
    }
}

/// Entry point of `tfcollect override`.
pub async fn run(config_path: &Path) -> Result<bool> {
    info!("Starting Terraform file collection - Override stage");
    info!("Platform: {}", std::env::consts::OS);

    let config = Config::load(config_path)?;
    let sources = config.override_sources();
    let listed: Vec<String> = sources.iter().map(|s| s.display().to_string()).collect();
    info!("Override sources: {}", listed.join(", "));

    let repos_dir = super::existing_repos_dir(&config)?;
    let copies = workspace::list_working_copies(&repos_dir)?;

    if copies.is_empty() {
        warn!("No repository directories found in {}", repos_dir.display());
        info!("Override stage completed with no repositories to process");
        return Ok(true);
    }

    info!("Found {} repositories to process", copies.len());

    let stage = OverrideStage::new(sources);
    let report = run_stage(&stage, copies).await;

    Ok(super::finish(&report))
}
