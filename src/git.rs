use crate::askpass::ASKPASS_BIN;
use crate::utils::run_command_cfg;
use anyhow::Context;
use std::path::{Path, PathBuf};

pub const COMMIT_MESSAGE: &str = "updated cohorts";
pub const REMOTE: &str = "origin";

/// What [`GitRepo::commit_and_push`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The working tree matched `HEAD`, so nothing was committed.
    NoChanges,
    /// A commit was created but not pushed (dry-run).
    Committed { sha: String, changes: usize },
    /// A commit was created and pushed to `origin`.
    Pushed { sha: String, changes: usize },
}

/// Commit identity written to the repository's local git config.
#[derive(Debug, Clone, Default)]
pub struct CommitIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A local clone driven through the `git` executable.
pub struct GitRepo {
    git: PathBuf,
    root: PathBuf,
}

impl GitRepo {
    /// Clones `url` at `branch` into `destination`, which must not exist or be empty.
    pub fn clone(url: &str, branch: &str, destination: &Path) -> anyhow::Result<Self> {
        let git = which::which("git").context("cannot find `git` on PATH")?;
        let repo = Self {
            git,
            root: destination.to_path_buf(),
        };
        let destination = destination.to_string_lossy();
        repo.run(None, &["clone", "--branch", branch, url, &destination])
            .with_context(|| format!("cannot clone {url}@{branch} into {destination}"))?;

        log::debug!("Status: '{}'", repo.status()?);
        log::info!("Active branch: {}", repo.current_branch()?);
        log::info!("Last commit: {}", repo.head_sha()?);
        for (name, url) in repo.remotes()? {
            log::info!("Remote {name} with URL {url}");
        }
        Ok(repo)
    }

    /// Opens an existing working tree at `root`.
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let git = which::which("git").context("cannot find `git` on PATH")?;
        let repo = Self {
            git,
            root: root.to_path_buf(),
        };
        repo.git(&["rev-parse", "--git-dir"])
            .with_context(|| format!("{} is not a git repository", root.display()))?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn head_sha(&self) -> anyhow::Result<String> {
        self.git(&["rev-parse", "HEAD"])
            .context("failed to get current commit")
    }

    pub fn current_branch(&self) -> anyhow::Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
            .context("failed to get current branch")
    }

    pub fn status(&self) -> anyhow::Result<String> {
        self.git(&["status"])
    }

    /// Remote names paired with their fetch URLs.
    pub fn remotes(&self) -> anyhow::Result<Vec<(String, String)>> {
        let names = self.git(&["remote"])?;
        names
            .lines()
            .map(|name| {
                let url = self.git(&["remote", "get-url", name])?;
                Ok((name.to_string(), url))
            })
            .collect()
    }

    pub fn set_identity(&self, identity: &CommitIdentity) -> anyhow::Result<()> {
        if let Some(name) = &identity.name {
            log::info!("Setting user.name config to {name}");
            self.git(&["config", "user.name", name])?;
        }
        if let Some(email) = &identity.email {
            log::info!("Setting user.email config to {email}");
            self.git(&["config", "user.email", email])?;
        }
        Ok(())
    }

    /// Stages every change in the working tree, including deletions.
    pub fn stage_all(&self) -> anyhow::Result<()> {
        self.git(&["add", "--all"]).map(|_| ())
    }

    /// Paths that differ between the index and `HEAD`.
    pub fn staged_changes(&self) -> anyhow::Result<Vec<String>> {
        let out = self.git(&["diff", "--cached", "--name-status", "HEAD"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    pub fn commit(&self, message: &str) -> anyhow::Result<String> {
        // `--no-verify` to avoid running git hooks of the mirrored repository.
        self.git(&["commit", "--no-verify", "-m", message])
            .context("cannot create commit")?;
        self.head_sha()
    }

    pub fn push(&self) -> anyhow::Result<()> {
        self.git(&["push", REMOTE, "HEAD"])
            .with_context(|| format!("cannot push to {REMOTE}"))
            .map(|_| ())
    }

    /// Stages everything, then commits and pushes unless the tree is unchanged.
    /// With `dry_run` the commit stays local.
    pub fn commit_and_push(
        &self,
        identity: &CommitIdentity,
        dry_run: bool,
    ) -> anyhow::Result<CommitOutcome> {
        self.set_identity(identity)?;
        self.stage_all()?;

        let changes = self.staged_changes()?.len();
        if changes == 0 {
            log::info!("No files have changed. Not committing");
            return Ok(CommitOutcome::NoChanges);
        }
        log::info!("Committing {changes} change(s)");
        let sha = self.commit(COMMIT_MESSAGE)?;

        let outcome = if dry_run {
            log::info!("Running in dry-run mode. Not pushing commit");
            CommitOutcome::Committed { sha, changes }
        } else {
            log::info!("Pushing commit");
            self.push()?;
            CommitOutcome::Pushed { sha, changes }
        };
        log::debug!("Status: '{}'", self.status()?);
        Ok(outcome)
    }

    fn git(&self, args: &[&str]) -> anyhow::Result<String> {
        self.run(Some(&self.root), args)
    }

    fn run(&self, dir: Option<&Path>, args: &[&str]) -> anyhow::Result<String> {
        let askpass = askpass_helper();
        run_command_cfg(&self.git.to_string_lossy(), |c| {
            if let Some(dir) = dir {
                c.current_dir(dir);
            }
            if let Some(helper) = &askpass {
                c.env("GIT_ASKPASS", helper);
            }
            c.args(args)
        })
    }
}

/// The credential helper shipped next to the running executable, used when
/// credentials are in the environment and no other askpass program is configured.
fn askpass_helper() -> Option<PathBuf> {
    if std::env::var_os("GIT_ASKPASS").is_some()
        || std::env::var_os("GIT_USERNAME").is_none()
        || std::env::var_os("GIT_PASSWORD").is_none()
    {
        return None;
    }
    let exe = std::env::current_exe().ok()?;
    let helper = exe
        .parent()?
        .join(format!("{ASKPASS_BIN}{}", std::env::consts::EXE_SUFFIX));
    helper.is_file().then_some(helper)
}
