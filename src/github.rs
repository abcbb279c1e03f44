//! GitHub API helpers: fetch a pull request's diff and keep a single
//! coverage comment on it up to date.

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;
use tracing::info;

const COMMENT_MARKER: &str = "<!-- covgate-comment -->";

/// Resolved GitHub Actions context, read from environment variables.
pub struct Context {
    token: String,
    repo: String,
    pr_number: u64,
    pub sha: Option<String>,
}

impl Context {
    /// Build a context from standard GitHub Actions environment variables
    /// (`GITHUB_TOKEN`, `GITHUB_REPOSITORY`, `GITHUB_REF`, `GITHUB_SHA`).
    /// `fallback_token` is used when `GITHUB_TOKEN` is unset.
    pub fn from_env(fallback_token: Option<&str>) -> Result<Self> {
        let token = match std::env::var("GITHUB_TOKEN") {
            Ok(token) => token,
            Err(_) => fallback_token
                .map(str::to_string)
                .context("GITHUB_TOKEN environment variable or a coverage access token is required")?,
        };
        let repo = std::env::var("GITHUB_REPOSITORY")
            .context("GITHUB_REPOSITORY environment variable is required")?;
        let github_ref = std::env::var("GITHUB_REF").unwrap_or_default();
        let pr_number = pr_number_from_ref(&github_ref)
            .context("could not determine PR number from GITHUB_REF")?;
        let sha = std::env::var("GITHUB_SHA").ok();
        Ok(Self {
            token,
            repo,
            pr_number,
            sha,
        })
    }

    /// Fetch the unified diff for the pull request.
    pub fn fetch_diff(&self) -> Result<String> {
        info!(repo = %self.repo, pr = self.pr_number, "fetching pull request diff");
        let url = format!("https://api.github.com/repos/{}/pulls/{}", self.repo, self.pr_number);
        let resp = self
            .request(ureq::get(&url))
            .set("Accept", "application/vnd.github.v3.diff")
            .call()
            .context("Failed to fetch PR diff from GitHub")?;
        resp.into_string()
            .context("Failed to read PR diff response body")
    }

    /// Create or update the coverage comment on the pull request.
    pub fn post_comment(&self, body: &str) -> Result<()> {
        let body_with_marker = format!("{}\n{}", COMMENT_MARKER, body);
        let payload = serde_json::json!({ "body": body_with_marker });

        let (action, resp) = match self.find_existing_comment()? {
            Some(comment_id) => {
                let url = format!(
                    "https://api.github.com/repos/{}/issues/comments/{}",
                    self.repo, comment_id
                );
                ("updating", self.request(ureq::patch(&url)).send_json(payload))
            }
            None => {
                let url = format!(
                    "https://api.github.com/repos/{}/issues/{}/comments",
                    self.repo, self.pr_number
                );
                ("creating", self.request(ureq::post(&url)).send_json(payload))
            }
        };

        match resp {
            Ok(_) => {}
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                bail!("GitHub API error {} comment (HTTP {}): {}", action, code, body);
            }
            Err(e) => bail!("Failed {} comment: {}", action, e),
        }

        info!(repo = %self.repo, pr = self.pr_number, "posted coverage comment");
        Ok(())
    }

    /// Find an existing coverage comment by its hidden marker.
    fn find_existing_comment(&self) -> Result<Option<u64>> {
        let mut page = 1u32;
        loop {
            let url = format!(
                "https://api.github.com/repos/{}/issues/{}/comments?per_page=100&page={}",
                self.repo, self.pr_number, page
            );
            let resp = self
                .request(ureq::get(&url))
                .call()
                .context("Failed to list PR comments")?;

            let comments: Vec<Comment> = resp.into_json().context("Failed to parse comments JSON")?;
            if comments.is_empty() {
                break;
            }
            for c in &comments {
                if c.body.as_deref().is_some_and(|b| b.contains(COMMENT_MARKER)) {
                    return Ok(Some(c.id));
                }
            }
            page += 1;
        }
        Ok(None)
    }

    fn request(&self, req: ureq::Request) -> ureq::Request {
        req.set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "covgate")
            .set("X-GitHub-Api-Version", "2022-11-28")
    }
}

#[derive(Deserialize)]
struct Comment {
    id: u64,
    body: Option<String>,
}

/// Extract the PR number from a ref like "refs/pull/42/merge".
fn pr_number_from_ref(github_ref: &str) -> Option<u64> {
    let parts: Vec<&str> = github_ref.split('/').collect();
    if parts.len() >= 3 && parts[0] == "refs" && parts[1] == "pull" {
        parts[2].parse().ok()
    } else {
        None
    }
}
