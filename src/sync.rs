use crate::cohort::write_cohorts;
use crate::config::Options;
use crate::git::{CommitIdentity, CommitOutcome, GitRepo};
use crate::webapi::WebApiClient;
use anyhow::Context;
use std::path::PathBuf;

#[derive(Debug)]
pub struct SyncResult {
    /// Number of cohort definitions returned by WebAPI.
    pub cohorts: usize,
    /// Distinct files written, in the order they were first written.
    pub files: Vec<PathBuf>,
    pub outcome: CommitOutcome,
}

/// Mirrors the cohort definitions of one WebAPI instance into one repository.
pub struct CohortSync {
    options: Options,
}

impl CohortSync {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Clones the repository, fetches and writes every cohort, then commits and
    /// pushes. Any failure aborts the run; files already written are left in place.
    pub fn run(&self) -> anyhow::Result<SyncResult> {
        let options = &self.options;

        log::info!(
            "Cloning repo '{}@{}' into '{}'",
            options.git_repo_url,
            options.git_branch,
            options.git_destination.display()
        );
        let repo = GitRepo::clone(
            &options.git_repo_url,
            &options.git_branch,
            &options.git_destination,
        )?;

        let mut client = WebApiClient::new(&options.webapi_url)?;
        if let Some(auth) = &options.webapi_auth {
            log::info!(
                "WebAPI auth is enabled. Using login provider @ {}",
                auth.login_path
            );
            client
                .authenticate(&auth.login_path, &auth.username, &auth.password)
                .context("cannot authenticate against WebAPI")?;
        }

        log::info!(
            "Fetching cohort definitions from WebAPI @ {}",
            client.base_url()
        );
        let cohorts = client.fetch_cohorts()?;
        log::info!("Retrieved a total of {} cohort(s)", cohorts.len());

        log::info!("Saving cohorts");
        let files = write_cohorts(
            &options.cohort_dir(),
            &options.cohort_file_prefix,
            &cohorts,
        )?;

        log::info!("Adding changes, committing, and pushing to origin");
        let identity = CommitIdentity {
            name: options.git_commit_user_name.clone(),
            email: options.git_commit_email.clone(),
        };
        let outcome = repo.commit_and_push(&identity, options.dry_run)?;

        log::info!("All done.");
        Ok(SyncResult {
            cohorts: cohorts.len(),
            files,
            outcome,
        })
    }
}
