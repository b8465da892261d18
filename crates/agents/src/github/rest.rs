//! [`GithubApi`] over the GitHub REST API, via `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::api::{Comment, Coordinates, GithubApi, GithubError, Issue, Notification};
use super::USER_AGENT;

const PER_PAGE: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RestGithub {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Deserialize)]
struct SelfUser {
    login: String,
}

impl RestGithub {
    pub fn new(api_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, &format!("{}{}", self.api_url, path))
    }

    fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
    }

    async fn checked(response: Response) -> Result<Response, GithubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        match status {
            StatusCode::UNAUTHORIZED => {
                Err(GithubError::Unauthorized(format!("HTTP {}", status.as_u16())))
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let exhausted = quota_exhausted(response.headers());
                let body = response.text().await.unwrap_or_default();
                if exhausted
                    || status == StatusCode::TOO_MANY_REQUESTS
                    || body.to_lowercase().contains("rate limit")
                {
                    Err(GithubError::RateLimited(url))
                } else {
                    Err(GithubError::Unauthorized(format!("HTTP {}", status.as_u16())))
                }
            }
            StatusCode::NOT_FOUND => Err(GithubError::NotFound(url)),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(GithubError::Status {
                    status: status.as_u16(),
                    url,
                    body,
                })
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GithubError> {
        debug!(path, "GitHub GET");
        let response = self.request(Method::GET, path).query(query).send().await?;
        let response = Self::checked(response).await?;
        response
            .json()
            .await
            .map_err(|e| GithubError::Parse(format!("{path}: {e}")))
    }

    /// Fetch every page of a listing, following `Link: rel="next"`.
    async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GithubError> {
        let mut q = query.to_vec();
        q.push(("per_page", PER_PAGE.to_string()));
        let mut request = self.request(Method::GET, path).query(&q);
        let mut all: Vec<T> = Vec::new();
        loop {
            debug!(path, fetched = all.len(), "GitHub GET");
            let response = Self::checked(request.send().await?).await?;
            let next = next_page(response.headers());
            let items: Vec<T> = response
                .json()
                .await
                .map_err(|e| GithubError::Parse(format!("{path}: {e}")))?;
            all.extend(items);
            match next {
                Some(url) => request = self.request_url(Method::GET, &url),
                None => return Ok(all),
            }
        }
    }
}

/// `x-ratelimit-remaining: 0` marks a 403 as quota, not credentials.
fn quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
}

/// The `rel="next"` target of a `Link` header.
fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        params
            .split(';')
            .any(|p| p.trim() == "rel=\"next\"")
            .then(|| {
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
    })
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl GithubApi for RestGithub {
    async fn self_login(&self) -> Result<String, GithubError> {
        let user: SelfUser = self.get("/user", &[]).await?;
        Ok(user.login)
    }

    async fn notifications(&self, since: DateTime<Utc>) -> Result<Vec<Notification>, GithubError> {
        self.paginate(
            "/notifications",
            &[
                ("participating", "true".to_string()),
                ("all", "true".to_string()),
                ("since", timestamp(since)),
            ],
        )
        .await
    }

    async fn issue(&self, coords: &Coordinates, number: u64) -> Result<Issue, GithubError> {
        self.get(
            &format!("/repos/{}/{}/issues/{number}", coords.owner, coords.repo),
            &[],
        )
        .await
    }

    async fn issue_comments(
        &self,
        coords: &Coordinates,
        number: u64,
    ) -> Result<Vec<Comment>, GithubError> {
        self.paginate(
            &format!(
                "/repos/{}/{}/issues/{number}/comments",
                coords.owner, coords.repo
            ),
            &[],
        )
        .await
    }

    async fn commit_comments(
        &self,
        coords: &Coordinates,
        sha: &str,
    ) -> Result<Vec<Comment>, GithubError> {
        self.paginate(
            &format!("/repos/{}/{}/commits/{sha}/comments", coords.owner, coords.repo),
            &[],
        )
        .await
    }

    async fn mark_read(&self, last_read_at: DateTime<Utc>) -> Result<(), GithubError> {
        let response = self
            .request(Method::PUT, "/notifications")
            .query(&[("last_read_at", timestamp(last_read_at))])
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = Self::checked(response).await?;
        match response.status() {
            StatusCode::RESET_CONTENT | StatusCode::ACCEPTED => Ok(()),
            other => Err(GithubError::Status {
                status: other.as_u16(),
                url: response.url().to_string(),
                body: String::from("expected 205 Reset Content"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::agent::AgentError;

    const THREAD: u64 = 1100;

    /// Answers each connection with `handler(base_url, request_target)`.
    async fn serve(handler: fn(&str, &str) -> String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let url = base.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let base = base.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head);
                    let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let reply = handler(&base, &target);
                    socket.write_all(reply.as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                });
            }
        });
        url
    }

    fn reply(status: &str, headers: &[(&str, String)], body: &str) -> String {
        let mut out = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
            body.len()
        );
        for (name, value) in headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str("\r\n");
        out.push_str(body);
        out
    }

    fn page_of(target: &str) -> u64 {
        target
            .split(['?', '&'])
            .find_map(|p| p.strip_prefix("page="))
            .and_then(|p| p.parse().ok())
            .unwrap_or(1)
    }

    /// One issue thread of [`THREAD`] comments, served 100 per page.
    fn long_thread(base: &str, target: &str) -> String {
        let page = page_of(target);
        let first = (page - 1) * PER_PAGE as u64 + 1;
        let last = (page * PER_PAGE as u64).min(THREAD);
        let comments: Vec<_> = (first..=last)
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "body": format!("comment {id}"),
                    "user": {"login": "alice"},
                    "created_at": "2016-11-03T10:00:00Z",
                    "updated_at": "2016-11-03T10:00:00Z",
                    "html_url": format!("https://github.com/a/b/issues/1#issuecomment-{id}")
                })
            })
            .collect();
        let mut headers = Vec::new();
        if last < THREAD {
            headers.push((
                "link",
                format!(
                    "<{base}/repos/a/b/issues/1/comments?per_page=100&page={}>; rel=\"next\", \
                     <{base}/repos/a/b/issues/1/comments?per_page=100&page=11>; rel=\"last\"",
                    page + 1
                ),
            ));
        }
        reply("200 OK", &headers, &serde_json::Value::from(comments).to_string())
    }

    fn quota_gone(_: &str, _: &str) -> String {
        reply(
            "403 Forbidden",
            &[("x-ratelimit-remaining", "0".to_string())],
            r#"{"message":"API rate limit exceeded"}"#,
        )
    }

    fn forbidden(_: &str, _: &str) -> String {
        reply(
            "403 Forbidden",
            &[("x-ratelimit-remaining", "4999".to_string())],
            r#"{"message":"Resource not accessible by personal access token"}"#,
        )
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let github = RestGithub::new("http://localhost:9999/", "t");
        assert_eq!(github.api_url, "http://localhost:9999");
    }

    #[test]
    fn timestamps_are_second_precision_utc() {
        let time = Utc.with_ymd_and_hms(2016, 11, 3, 7, 5, 9).unwrap();
        assert_eq!(timestamp(time), "2016-11-03T07:05:09Z");
    }

    #[test]
    fn next_page_reads_link_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/x?page=1>; rel=\"prev\", <https://api.github.com/x?page=3>; rel=\"next\"",
            ),
        );
        assert_eq!(
            next_page(&headers).as_deref(),
            Some("https://api.github.com/x?page=3")
        );
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"first\""),
        );
        assert_eq!(next_page(&headers), None);
    }

    #[tokio::test]
    async fn long_thread_is_read_to_the_end() {
        let github = RestGithub::new(&serve(long_thread).await, "t");
        let coords: Coordinates = "a/b".parse().unwrap();
        let comments = github.issue_comments(&coords, 1).await.unwrap();
        assert_eq!(comments.len(), THREAD as usize);
        assert_eq!(comments.last().map(|c| c.id), Some(THREAD));
    }

    #[tokio::test]
    async fn exhausted_quota_is_not_the_users_fault() {
        let github = RestGithub::new(&serve(quota_gone).await, "t");
        let err = github.self_login().await.unwrap_err();
        assert!(matches!(err, GithubError::RateLimited(_)), "{err}");
        assert_eq!(AgentError::from(err).category(), "internal-error");
    }

    #[tokio::test]
    async fn forbidden_token_is_the_users_fault() {
        let github = RestGithub::new(&serve(forbidden).await, "t");
        let err = github.self_login().await.unwrap_err();
        assert!(matches!(err, GithubError::Unauthorized(_)), "{err}");
        assert_eq!(AgentError::from(err).category(), "user-error");
    }
}
