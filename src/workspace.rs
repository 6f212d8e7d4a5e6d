//! On-disk layout of working copies: `<repos_dir>/<project>/<repo>`.

use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{CollectError, Result};

pub const TERRAFORM_EXTENSION: &str = "tf";
pub const STATE_FILE_NAME: &str = "terraform.tfstate";

const VCS_METADATA_DIRS: [&str; 3] = [".git", ".hg", ".svn"];

/// Project and repository name parsed from an SSH clone URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocator {
    pub project: String,
    pub repo: String,
}

impl RepoLocator {
    /// Parses `user@host:project/repo[.git]`. Every other form, including
    /// `ssh://` and `https://` URLs, is rejected.
    pub fn parse(url: &str) -> Result<Self> {
        let unsupported = || CollectError::UnsupportedRepoUrl(url.to_string());

        if url.contains("://") {
            return Err(unsupported());
        }

        let (user, rest) = url.split_once('@').ok_or_else(unsupported)?;
        let (host, path) = rest.split_once(':').ok_or_else(unsupported)?;
        if user.is_empty() || user.contains(['/', ':']) || host.is_empty() || host.contains('/') {
            return Err(unsupported());
        }

        let path = path.strip_suffix(".git").unwrap_or(path);
        let (project, repo) = path.split_once('/').ok_or_else(unsupported)?;

        if !is_valid_segment(project) || !is_valid_segment(repo) {
            return Err(unsupported());
        }

        Ok(Self {
            project: project.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn working_copy(&self, repos_dir: &Path) -> PathBuf {
        repos_dir.join(&self.project).join(&self.repo)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

/// A working-copy directory found under the repos directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    pub path: PathBuf,
    /// `project/repo`, for logs
    pub name: String,
}

impl fmt::Display for WorkingCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lists every non-hidden directory two levels below `repos_dir`, sorted by path.
pub fn list_working_copies(repos_dir: &Path) -> Result<Vec<WorkingCopy>> {
    let mut copies = Vec::new();

    for project in visible_subdirs(repos_dir)? {
        let project_name = file_name(&project);
        for repo in visible_subdirs(&project)? {
            let name = format!("{project_name}/{}", file_name(&repo));
            copies.push(WorkingCopy { path: repo, name });
        }
    }

    copies.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(copies)
}

fn visible_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn is_terraform_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(TERRAFORM_EXTENSION)
}

fn is_vcs_metadata(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && VCS_METADATA_DIRS
            .iter()
            .any(|name| entry.file_name() == *name)
}

/// True if any `.tf` file exists below `dir`, ignoring VCS metadata directories.
pub fn has_terraform_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| !is_vcs_metadata(entry))
        .filter_map(std::result::Result::ok)
        .any(|entry| entry.file_type().is_file() && is_terraform_file(entry.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_ssh_url_with_git_suffix() {
        let locator = RepoLocator::parse("git@host:org/repo.git").unwrap();
        assert_eq!(locator.project, "org");
        assert_eq!(locator.repo, "repo");
    }

    #[test]
    fn test_parse_ssh_url_without_git_suffix() {
        let locator = RepoLocator::parse("git@host:org/repo").unwrap();
        assert_eq!(
            locator,
            RepoLocator {
                project: "org".to_string(),
                repo: "repo".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_other_user() {
        let locator = RepoLocator::parse("deploy@bitbucket.example.com:infra/network.git").unwrap();
        assert_eq!(locator.project, "infra");
        assert_eq!(locator.repo, "network");
    }

    #[test]
    fn test_parse_rejects_https() {
        let err = RepoLocator::parse("https://host/org/repo.git").unwrap_err();
        assert!(matches!(err, CollectError::UnsupportedRepoUrl(_)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for url in [
            "ssh://git@host:7999/org/repo.git",
            "host:org/repo.git",
            "git@host:repo.git",
            "git@host:org/",
            "git@host:/repo",
            "git@host:org/team/repo.git",
            "git@:org/repo",
            "@host:org/repo",
            "git@host:../repo",
        ] {
            assert!(RepoLocator::parse(url).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_working_copy_path() {
        let locator = RepoLocator::parse("git@host:org/repo.git").unwrap();
        assert_eq!(
            locator.working_copy(Path::new("/srv/repos")),
            PathBuf::from("/srv/repos/org/repo")
        );
    }

    #[test]
    fn test_list_working_copies_skips_hidden_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("org-b/repo-2")).unwrap();
        fs::create_dir_all(base.join("org-a/repo-1")).unwrap();
        fs::create_dir_all(base.join("org-a/.cache")).unwrap();
        fs::create_dir_all(base.join(".hidden/repo")).unwrap();
        fs::write(base.join("org-a/notes.txt"), "x").unwrap();
        fs::write(base.join("README"), "x").unwrap();

        let copies = list_working_copies(base).unwrap();
        let names: Vec<_> = copies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["org-a/repo-1", "org-b/repo-2"]);
        assert_eq!(copies[0].path, base.join("org-a/repo-1"));
    }

    #[test]
    fn test_list_working_copies_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_working_copies(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_has_terraform_files_nested() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("modules/vpc")).unwrap();
        fs::write(dir.path().join("modules/vpc/main.tf"), "").unwrap();

        assert!(has_terraform_files(dir.path()));
    }

    #[test]
    fn test_has_terraform_files_ignores_git_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/info")).unwrap();
        fs::write(dir.path().join(".git/info/stale.tf"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();
        fs::write(dir.path().join("main.tf.bak"), "").unwrap();

        assert!(!has_terraform_files(dir.path()));
    }
}
