//! Shared fixtures for the workflow tests: a local bare Git repository standing in
//! for `origin`, and a stub WebAPI served from a background thread.

#![allow(dead_code)]

use ohdsi_git_sync::config::Options;
use ohdsi_git_sync::utils::run_command_at;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let mut cmd = vec!["git"];
    cmd.extend_from_slice(args);
    run_command_at(&cmd, dir).unwrap()
}

/// A bare repository with one commit on `master`, plus scratch space for clones.
pub struct GitFixture {
    pub dir: TempDir,
    pub remote: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote.git");
        let seed = dir.path().join("seed");
        std::fs::create_dir_all(&remote).unwrap();
        std::fs::create_dir_all(&seed).unwrap();

        git(&remote, &["init", "--bare"]);
        git(&seed, &["init"]);
        git(&seed, &["checkout", "-b", "master"]);
        std::fs::write(seed.join("README.md"), "# Cohorts\n").unwrap();
        git(&seed, &["add", "README.md"]);
        git(
            &seed,
            &[
                "-c",
                "user.name=Seed",
                "-c",
                "user.email=seed@example.org",
                "commit",
                "-m",
                "initial",
            ],
        );
        git(&seed, &["push", &remote.to_string_lossy(), "master"]);

        Self { dir, remote }
    }

    pub fn url(&self) -> String {
        self.remote.to_string_lossy().to_string()
    }

    /// Fresh, not yet existing clone destination.
    pub fn destination(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn remote_head(&self) -> String {
        git(&self.remote, &["rev-parse", "refs/heads/master"])
    }

    /// Makes the remote refuse every push.
    #[cfg(unix)]
    pub fn reject_pushes(&self) {
        use std::os::unix::fs::PermissionsExt;
        let hook = self.remote.join("hooks").join("pre-receive");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(&hook, "#!/bin/sh\necho 'pushes are frozen' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn remote_log(&self) -> Vec<String> {
        git(&self.remote, &["log", "--format=%s", "master"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn remote_file(&self, path: &str) -> Option<String> {
        run_command_at(["git", "show", &format!("master:{path}")], &self.remote).ok()
    }

    /// Options for a run into `destination` against `webapi_url`.
    pub fn options(&self, destination: &str, webapi_url: &str) -> Options {
        Options {
            git_repo_url: self.url(),
            git_branch: "master".to_string(),
            git_destination: self.destination(destination),
            git_sub_path: PathBuf::from("cohorts"),
            git_commit_user_name: Some("Sync Bot".to_string()),
            git_commit_email: Some("sync@example.org".to_string()),
            cohort_file_prefix: "cohort-".to_string(),
            webapi_url: webapi_url.to_string(),
            webapi_auth: None,
            dry_run: false,
            verbose: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Minimal HTTP/1.1 server answering canned responses keyed by method and path.
/// Unknown routes get a 404. Each connection serves a single request.
pub struct StubWebApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubWebApi {
    pub fn start(routes: Vec<(&str, &str, StubResponse)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: HashMap<(String, String), StubResponse> = routes
            .into_iter()
            .map(|(method, path, response)| ((method.to_string(), path.to_string()), response))
            .collect();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &routes, &recorded);
            }
        });

        Self {
            base_url: format!("http://{addr}/WebAPI"),
            requests,
        }
    }

    /// Serves a cohort list and details built from `(id, name, expression)` triples.
    pub fn with_cohorts(cohorts: &[(i64, &str, &str)]) -> Self {
        let list: Vec<serde_json::Value> = cohorts
            .iter()
            .map(|(id, name, _)| serde_json::json!({ "id": id, "name": name, "description": null }))
            .collect();
        let mut routes = vec![(
            "GET",
            "/WebAPI/cohortdefinition".to_string(),
            StubResponse::json(serde_json::to_string(&list).unwrap()),
        )];
        for (id, name, expression) in cohorts {
            let detail = serde_json::json!({ "id": id, "name": name, "expression": expression });
            routes.push((
                "GET",
                format!("/WebAPI/cohortdefinition/{id}"),
                StubResponse::json(detail.to_string()),
            ));
        }
        Self::start(
            routes
                .iter()
                .map(|(m, p, r)| (*m, p.as_str(), r.clone()))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(
    mut stream: TcpStream,
    routes: &HashMap<(String, String), StubResponse>,
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).ok()?;

    let response = routes
        .get(&(method.clone(), path.clone()))
        .cloned()
        .unwrap_or_else(|| StubResponse::status(404));
    recorded.lock().unwrap().push(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    });

    let mut head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).ok()?;
    stream.write_all(response.body.as_bytes()).ok()?;
    stream.flush().ok()
}
