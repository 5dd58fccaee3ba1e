use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_GIT_BRANCH: &str = "master";
pub const DEFAULT_GIT_DESTINATION: &str = "git";
pub const DEFAULT_COHORT_FILE_PREFIX: &str = "cohort-";

/// Mirror OHDSI WebAPI cohort definitions into a Git repository.
#[derive(clap::Parser, Debug, Default)]
#[command(name = "ohdsi-git-sync", version, about)]
pub struct SyncArgs {
    /// Git repo URL, e.g. https://github.com/miracum/atlas-git-sync.git
    #[arg(long, env = "GIT_REPO_URL")]
    pub git_repo_url: Option<String>,
    /// Git branch to clone and push to [default: master]
    #[arg(long, env = "GIT_BRANCH")]
    pub git_branch: Option<String>,
    /// Where to clone the repo in the local filesystem [default: git]
    #[arg(long, env = "GIT_DESTINATION")]
    pub git_destination: Option<PathBuf>,
    /// Path inside the repo where cohort definitions are stored.
    /// Created if it doesn't already exist.
    #[arg(long, env = "GIT_SUB_PATH")]
    pub git_sub_path: Option<PathBuf>,
    /// Commit author name (git's `user.name`) [default: $GIT_USERNAME]
    #[arg(long, env = "GIT_COMMIT_USER_NAME")]
    pub git_commit_user_name: Option<String>,
    /// Commit author email (git's `user.email`)
    #[arg(long, env = "GIT_COMMIT_EMAIL")]
    pub git_commit_email: Option<String>,
    /// Prefix of the saved cohort definition files [default: cohort-]
    #[arg(long, env = "COHORT_FILE_PREFIX")]
    pub cohort_file_prefix: Option<String>,
    /// OHDSI WebAPI base URL, e.g. https://atlas.ohdsi.org/WebAPI
    #[arg(long, env = "WEBAPI_URL")]
    pub webapi_url: Option<String>,
    /// Path of the WebAPI login provider relative to the base URL, e.g. /user/login/db
    #[arg(long, env = "WEBAPI_AUTH_LOGIN_PATH")]
    pub webapi_auth_login_path: Option<String>,
    #[arg(long, env = "WEBAPI_AUTH_USERNAME")]
    pub webapi_auth_username: Option<String>,
    #[arg(long, env = "WEBAPI_AUTH_PASSWORD", hide_env_values = true)]
    pub webapi_auth_password: Option<String>,
    /// Clone, fetch and commit, but don't push to origin
    #[arg(long, env = "DRY_RUN", value_parser = clap::builder::FalseyValueParser::new())]
    pub dry_run: bool,
    /// TOML file supplying any of the options above
    #[arg(long, env = "OHDSI_GIT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,
    /// Log debug output, including every git command
    #[arg(short, long, env = "VERBOSE", value_parser = clap::builder::FalseyValueParser::new())]
    pub verbose: bool,
}

/// Options read from the config file. Flags and environment variables take
/// precedence over anything set here.
#[derive(serde::Deserialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub git_repo_url: Option<String>,
    pub git_branch: Option<String>,
    pub git_destination: Option<PathBuf>,
    pub git_sub_path: Option<PathBuf>,
    pub git_commit_user_name: Option<String>,
    pub git_commit_email: Option<String>,
    pub cohort_file_prefix: Option<String>,
    pub webapi_url: Option<String>,
    pub webapi_auth_login_path: Option<String>,
    pub webapi_auth_username: Option<String>,
    pub webapi_auth_password: Option<String>,
    pub dry_run: Option<bool>,
}

pub fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("cannot load config file from {}", path.display()))?;
    let config: FileConfig = toml::from_str(&data).context("cannot load config as TOML")?;
    Ok(config)
}

#[derive(Clone)]
pub struct WebApiAuth {
    /// Relative to the WebAPI base URL.
    pub login_path: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for WebApiAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebApiAuth")
            .field("login_path", &self.login_path)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fully resolved options. Built once at startup and never modified afterwards.
#[derive(Clone, Debug)]
pub struct Options {
    pub git_repo_url: String,
    pub git_branch: String,
    pub git_destination: PathBuf,
    pub git_sub_path: PathBuf,
    pub git_commit_user_name: Option<String>,
    pub git_commit_email: Option<String>,
    pub cohort_file_prefix: String,
    pub webapi_url: String,
    pub webapi_auth: Option<WebApiAuth>,
    pub dry_run: bool,
    pub verbose: bool,
}

impl Options {
    /// Parses the config file named by `args` (if any) and resolves the final options.
    pub fn load(args: SyncArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => load_config(path)?,
            None => FileConfig::default(),
        };
        let git_username = std::env::var("GIT_USERNAME").ok();
        Self::resolve(args, file, git_username)
    }

    /// Merges flags/environment with the config file and defaults, in that order.
    /// `git_username` is the fallback commit author name.
    pub fn resolve(
        args: SyncArgs,
        file: FileConfig,
        git_username: Option<String>,
    ) -> anyhow::Result<Self> {
        let git_repo_url = required("git-repo-url", pick(args.git_repo_url, file.git_repo_url))?;
        let git_sub_path = pick(args.git_sub_path, file.git_sub_path)
            .with_context(|| missing("git-sub-path"))?;
        let webapi_url = required("webapi-url", pick(args.webapi_url, file.webapi_url))?;

        let webapi_auth = match pick(args.webapi_auth_login_path, file.webapi_auth_login_path)
            .filter(|p| !p.is_empty())
        {
            Some(login_path) => Some(WebApiAuth {
                login_path,
                username: pick(args.webapi_auth_username, file.webapi_auth_username)
                    .filter(|u| !u.is_empty())
                    .context("WebAPI auth is enabled, but webapi-auth-username is not set")?,
                password: pick(args.webapi_auth_password, file.webapi_auth_password)
                    .context("WebAPI auth is enabled, but webapi-auth-password is not set")?,
            }),
            None => None,
        };

        Ok(Self {
            git_repo_url,
            git_branch: pick(args.git_branch, file.git_branch)
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_GIT_BRANCH.to_string()),
            git_destination: pick(args.git_destination, file.git_destination)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GIT_DESTINATION)),
            git_sub_path,
            git_commit_user_name: pick(args.git_commit_user_name, file.git_commit_user_name)
                .filter(|n| !n.is_empty())
                .or(git_username)
                .filter(|n| !n.is_empty()),
            git_commit_email: pick(args.git_commit_email, file.git_commit_email)
                .filter(|e| !e.is_empty()),
            cohort_file_prefix: pick(args.cohort_file_prefix, file.cohort_file_prefix)
                .unwrap_or_else(|| DEFAULT_COHORT_FILE_PREFIX.to_string()),
            webapi_url,
            webapi_auth,
            dry_run: args.dry_run || file.dry_run.unwrap_or(false),
            verbose: args.verbose,
        })
    }

    /// Directory inside the clone that receives the cohort files.
    pub fn cohort_dir(&self) -> PathBuf {
        self.git_destination.join(&self.git_sub_path)
    }
}

fn pick<T>(flag: Option<T>, file: Option<T>) -> Option<T> {
    flag.or(file)
}

fn required(name: &str, value: Option<String>) -> anyhow::Result<String> {
    value
        .filter(|v| !v.is_empty())
        .with_context(|| missing(name))
}

fn missing(name: &str) -> String {
    let env = name.to_uppercase().replace('-', "_");
    format!("missing required option --{name} (or the {env} environment variable)")
}
