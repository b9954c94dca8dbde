//! In-process fake of the GitHub REST endpoints the publisher talks to.
//!
//! Holds refs, commits, flattened trees, blobs and pull requests in memory.
//! Every request is recorded, and scripted faults can be queued to make the
//! next matching request fail.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ideaworks::hosting::{ContentPublisher, GitHubClient, GitHubSettings};
use serde_json::{Value, json};

pub const OWNER: &str = "acme";
pub const REPO: &str = "works";
pub const TOKEN: &str = "ghp_testtoken";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub api_version: Option<String>,
    pub user_agent: Option<String>,
}

/// A scripted failure for the next request whose path contains `path`.
#[derive(Debug, Clone)]
pub struct Fault {
    pub method: Option<Method>,
    pub path: String,
    pub status: u16,
    pub body: String,
    pub retry_after: Option<String>,
}

impl Fault {
    pub fn status(path: &str, status: u16) -> Self {
        Self {
            method: None,
            path: path.to_string(),
            status,
            body: json!({ "message": "injected" }).to_string(),
            retry_after: None,
        }
    }

    pub fn on(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn retry_after(mut self, value: &str) -> Self {
        self.retry_after = Some(value.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeCommit {
    pub tree: String,
    pub parents: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FakePull {
    pub number: u64,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub html_url: String,
    pub open: bool,
}

#[derive(Default)]
struct Repo {
    next_sha: u64,
    refs: HashMap<String, String>,
    commits: HashMap<String, FakeCommit>,
    trees: HashMap<String, BTreeMap<String, Vec<u8>>>,
    blobs: HashMap<String, Vec<u8>>,
    pulls: Vec<FakePull>,
    requests: Vec<RecordedRequest>,
    faults: VecDeque<Fault>,
}

impl Repo {
    fn mint_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("{:040x}", self.next_sha)
    }

    fn add_commit(&mut self, tree: BTreeMap<String, Vec<u8>>, parents: Vec<String>, message: &str) -> String {
        let tree_sha = self.mint_sha();
        self.trees.insert(tree_sha.clone(), tree);
        let sha = self.mint_sha();
        self.commits.insert(
            sha.clone(),
            FakeCommit {
                tree: tree_sha,
                parents,
                message: message.to_string(),
            },
        );
        sha
    }

    /// Branch name or commit SHA to a flattened tree.
    fn tree_at(&self, git_ref: &str) -> Option<&BTreeMap<String, Vec<u8>>> {
        let sha = self.refs.get(git_ref).map(String::as_str).unwrap_or(git_ref);
        let commit = self.commits.get(sha)?;
        self.trees.get(&commit.tree)
    }

    fn is_ancestor(&self, ancestor: &str, mut sha: String) -> bool {
        loop {
            if sha == ancestor {
                return true;
            }
            match self.commits.get(&sha).and_then(|c| c.parents.first()) {
                Some(parent) => sha = parent.clone(),
                None => return false,
            }
        }
    }

    fn take_fault(&mut self, method: &Method, path: &str) -> Option<Fault> {
        let idx = self.faults.iter().position(|f| {
            path.contains(&f.path) && f.method.as_ref().is_none_or(|m| m == method)
        })?;
        self.faults.remove(idx)
    }
}

type Shared = Arc<Mutex<Repo>>;

pub struct FakeGitHub {
    pub url: String,
    repo: Shared,
}

impl FakeGitHub {
    /// Serve on an ephemeral port with `main` on an empty root commit.
    pub async fn start() -> Self {
        let repo: Shared = Arc::new(Mutex::new(Repo::default()));
        {
            let mut r = repo.lock().unwrap();
            let root = r.add_commit(BTreeMap::new(), Vec::new(), "root");
            r.refs.insert("main".to_string(), root);
        }

        let app = Router::new()
            .route("/repos/{owner}/{repo}/git/ref/heads/{*branch}", get(get_ref))
            .route("/repos/{owner}/{repo}/git/refs", post(create_ref))
            .route("/repos/{owner}/{repo}/git/refs/heads/{*branch}", patch(update_ref))
            .route("/repos/{owner}/{repo}/git/commits", post(create_commit))
            .route("/repos/{owner}/{repo}/git/commits/{sha}", get(get_commit))
            .route("/repos/{owner}/{repo}/git/blobs", post(create_blob))
            .route("/repos/{owner}/{repo}/git/trees", post(create_tree))
            .route("/repos/{owner}/{repo}/pulls", get(list_pulls).post(create_pull))
            .route("/repos/{owner}/{repo}/contents/{*path}", get(get_contents))
            .layer(middleware::from_fn_with_state(repo.clone(), record_and_fault))
            .with_state(repo.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            repo,
        }
    }

    pub fn settings(&self) -> GitHubSettings {
        GitHubSettings {
            api_url: self.url.clone(),
            owner: OWNER.to_string(),
            repo: REPO.to_string(),
            base_branch: "main".to_string(),
            token: TOKEN.to_string(),
            retries: 2,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn client(&self) -> Arc<GitHubClient> {
        Arc::new(GitHubClient::new(self.settings()).unwrap())
    }

    pub fn publisher(&self) -> ContentPublisher {
        ContentPublisher::new(self.client())
    }

    /// Commit `files` on top of `main`.
    pub fn seed_files(&self, files: &[(&str, &str)]) -> String {
        let mut r = self.repo.lock().unwrap();
        let head = r.refs["main"].clone();
        let mut tree = r.tree_at(&head).cloned().unwrap_or_default();
        for (path, content) in files {
            tree.insert(path.to_string(), content.as_bytes().to_vec());
        }
        let sha = r.add_commit(tree, vec![head], "seed");
        r.refs.insert("main".to_string(), sha.clone());
        sha
    }

    pub fn file_bytes(&self, git_ref: &str, path: &str) -> Option<Vec<u8>> {
        let r = self.repo.lock().unwrap();
        r.tree_at(git_ref).and_then(|t| t.get(path).cloned())
    }

    pub fn file_at(&self, git_ref: &str, path: &str) -> Option<String> {
        self.file_bytes(git_ref, path)
            .map(|b| String::from_utf8(b).unwrap())
    }

    pub fn paths_at(&self, git_ref: &str) -> Vec<String> {
        let r = self.repo.lock().unwrap();
        r.tree_at(git_ref)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn ref_sha(&self, branch: &str) -> Option<String> {
        self.repo.lock().unwrap().refs.get(branch).cloned()
    }

    pub fn commit(&self, sha: &str) -> Option<FakeCommit> {
        self.repo.lock().unwrap().commits.get(sha).cloned()
    }

    pub fn pulls(&self) -> Vec<FakePull> {
        self.repo.lock().unwrap().pulls.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.repo.lock().unwrap().requests.clone()
    }

    /// Requests with `method` whose path contains `fragment`.
    pub fn requests_to(&self, method: &str, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.contains(fragment))
            .count()
    }

    pub fn push_fault(&self, fault: Fault) {
        self.repo.lock().unwrap().faults.push_back(fault);
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn record_and_fault(State(repo): State<Shared>, req: Request, next: Next) -> Response {
    let fault = {
        let mut r = repo.lock().unwrap();
        let headers = req.headers();
        r.requests.push(RecordedRequest {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            authorization: header(headers, "authorization"),
            accept: header(headers, "accept"),
            api_version: header(headers, "x-github-api-version"),
            user_agent: header(headers, "user-agent"),
        });
        r.take_fault(req.method(), req.uri().path())
    };

    match fault {
        Some(fault) => {
            let status = StatusCode::from_u16(fault.status).unwrap();
            let mut resp = (status, fault.body).into_response();
            if let Some(retry_after) = fault.retry_after {
                resp.headers_mut()
                    .insert("retry-after", retry_after.parse().unwrap());
            }
            resp
        }
        None => next.run(req).await,
    }
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn known_repo(owner: &str, repo: &str) -> bool {
    owner == OWNER && repo == REPO
}

async fn get_ref(
    State(repo): State<Shared>,
    Path((owner, name, branch)): Path<(String, String, String)>,
) -> Response {
    let branch = branch.trim_start_matches('/');
    let r = repo.lock().unwrap();
    match r.refs.get(branch) {
        Some(sha) if known_repo(&owner, &name) => Json(json!({
            "ref": format!("refs/heads/{branch}"),
            "object": { "sha": sha, "type": "commit" },
        }))
        .into_response(),
        _ => message(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn create_ref(State(repo): State<Shared>, Json(body): Json<Value>) -> Response {
    let full = body["ref"].as_str().unwrap_or_default();
    let sha = body["sha"].as_str().unwrap_or_default().to_string();
    let Some(branch) = full.strip_prefix("refs/heads/") else {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Reference name is invalid");
    };
    let mut r = repo.lock().unwrap();
    if r.refs.contains_key(branch) {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Reference already exists");
    }
    if !r.commits.contains_key(&sha) {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Object does not exist");
    }
    r.refs.insert(branch.to_string(), sha.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "ref": full, "object": { "sha": sha, "type": "commit" } })),
    )
        .into_response()
}

async fn update_ref(
    State(repo): State<Shared>,
    Path((_owner, _name, branch)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let branch = branch.trim_start_matches('/').to_string();
    let sha = body["sha"].as_str().unwrap_or_default().to_string();
    let force = body["force"].as_bool().unwrap_or(false);
    let mut r = repo.lock().unwrap();
    let Some(current) = r.refs.get(&branch).cloned() else {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Reference does not exist");
    };
    if !r.commits.contains_key(&sha) {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Object does not exist");
    }
    if !force && !r.is_ancestor(&current, sha.clone()) {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Update is not a fast forward");
    }
    r.refs.insert(branch.clone(), sha.clone());
    Json(json!({
        "ref": format!("refs/heads/{branch}"),
        "object": { "sha": sha, "type": "commit" },
    }))
    .into_response()
}

async fn get_commit(
    State(repo): State<Shared>,
    Path((_owner, _name, sha)): Path<(String, String, String)>,
) -> Response {
    let r = repo.lock().unwrap();
    match r.commits.get(&sha) {
        Some(c) => Json(json!({
            "sha": sha,
            "tree": { "sha": c.tree },
            "message": c.message,
            "parents": c.parents.iter().map(|p| json!({ "sha": p })).collect::<Vec<_>>(),
        }))
        .into_response(),
        None => message(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn create_commit(State(repo): State<Shared>, Json(body): Json<Value>) -> Response {
    let tree = body["tree"].as_str().unwrap_or_default().to_string();
    let message_text = body["message"].as_str().unwrap_or_default().to_string();
    let parents: Vec<String> = body["parents"]
        .as_array()
        .map(|ps| ps.iter().filter_map(|p| p.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let mut r = repo.lock().unwrap();
    if !r.trees.contains_key(&tree) {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Tree SHA does not exist");
    }
    let sha = r.mint_sha();
    r.commits.insert(
        sha.clone(),
        FakeCommit {
            tree: tree.clone(),
            parents,
            message: message_text,
        },
    );
    (
        StatusCode::CREATED,
        Json(json!({ "sha": sha, "tree": { "sha": tree } })),
    )
        .into_response()
}

async fn create_blob(State(repo): State<Shared>, Json(body): Json<Value>) -> Response {
    let content = body["content"].as_str().unwrap_or_default();
    let bytes = match body["encoding"].as_str() {
        Some("base64") => match STANDARD.decode(content) {
            Ok(b) => b,
            Err(_) => return message(StatusCode::UNPROCESSABLE_ENTITY, "Invalid base64"),
        },
        _ => content.as_bytes().to_vec(),
    };
    let mut r = repo.lock().unwrap();
    let sha = r.mint_sha();
    r.blobs.insert(sha.clone(), bytes);
    (StatusCode::CREATED, Json(json!({ "sha": sha }))).into_response()
}

async fn create_tree(State(repo): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut r = repo.lock().unwrap();
    let base = body["base_tree"].as_str().unwrap_or_default();
    let Some(mut tree) = r.trees.get(base).cloned() else {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "base_tree is not a valid tree");
    };
    for entry in body["tree"].as_array().cloned().unwrap_or_default() {
        let Some(path) = entry["path"].as_str() else {
            return message(StatusCode::UNPROCESSABLE_ENTITY, "tree entry without path");
        };
        let bytes = match (entry["content"].as_str(), entry["sha"].as_str()) {
            (Some(content), None) => content.as_bytes().to_vec(),
            (None, Some(sha)) => match r.blobs.get(sha) {
                Some(b) => b.clone(),
                None => return message(StatusCode::UNPROCESSABLE_ENTITY, "blob does not exist"),
            },
            _ => {
                return message(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "exactly one of content or sha is required",
                );
            }
        };
        tree.insert(path.to_string(), bytes);
    }
    let sha = r.mint_sha();
    r.trees.insert(sha.clone(), tree);
    (StatusCode::CREATED, Json(json!({ "sha": sha }))).into_response()
}

fn pull_json(pr: &FakePull) -> Value {
    json!({
        "number": pr.number,
        "html_url": pr.html_url,
        "state": if pr.open { "open" } else { "closed" },
        "title": pr.title,
        "head": { "ref": pr.head },
        "base": { "ref": pr.base },
    })
}

async fn create_pull(State(repo): State<Shared>, Json(body): Json<Value>) -> Response {
    let head = body["head"].as_str().unwrap_or_default().to_string();
    let base = body["base"].as_str().unwrap_or_default().to_string();
    let mut r = repo.lock().unwrap();
    if !r.refs.contains_key(&head) {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Validation Failed: head invalid");
    }
    if r.pulls.iter().any(|p| p.open && p.head == head) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Validation Failed",
                "errors": [{
                    "resource": "PullRequest",
                    "code": "custom",
                    "message": format!("A pull request already exists for {OWNER}:{head}."),
                }],
            })),
        )
            .into_response();
    }
    let number = r.pulls.len() as u64 + 1;
    let pr = FakePull {
        number,
        head,
        base,
        title: body["title"].as_str().unwrap_or_default().to_string(),
        body: body["body"].as_str().unwrap_or_default().to_string(),
        html_url: format!("https://github.com/{OWNER}/{REPO}/pull/{number}"),
        open: true,
    };
    let out = pull_json(&pr);
    r.pulls.push(pr);
    (StatusCode::CREATED, Json(out)).into_response()
}

async fn list_pulls(
    State(repo): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let r = repo.lock().unwrap();
    let head = query.get("head").cloned();
    let want_open = query.get("state").map(String::as_str) != Some("closed");
    let list: Vec<Value> = r
        .pulls
        .iter()
        .filter(|p| p.open == want_open)
        .filter(|p| {
            head.as_deref()
                .is_none_or(|h| h == format!("{OWNER}:{}", p.head))
        })
        .map(pull_json)
        .collect();
    Json(list).into_response()
}

async fn get_contents(
    State(repo): State<Shared>,
    Path((_owner, _name, path)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let path = path.trim_start_matches('/').to_string();
    let git_ref = query.get("ref").cloned().unwrap_or_else(|| "main".to_string());
    let r = repo.lock().unwrap();
    let Some(tree) = r.tree_at(&git_ref) else {
        return message(StatusCode::NOT_FOUND, "No commit found for the ref");
    };
    if let Some(bytes) = tree.get(&path) {
        let encoded = STANDARD.encode(bytes);
        // The contents API wraps base64 at 60 columns.
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        return Json(json!({
            "type": "file",
            "path": path,
            "encoding": "base64",
            "content": format!("{}\n", wrapped.join("\n")),
        }))
        .into_response();
    }
    let prefix = format!("{path}/");
    let children: Vec<Value> = tree
        .keys()
        .filter(|k| k.starts_with(&prefix))
        .map(|k| json!({ "type": "file", "path": k }))
        .collect();
    if children.is_empty() {
        message(StatusCode::NOT_FOUND, "Not Found")
    } else {
        Json(children).into_response()
    }
}
