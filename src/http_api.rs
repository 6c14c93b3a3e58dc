//! reqwest-backed [`WorkoutApi`].

use crate::api::{ApiError, ApiResult, WorkoutApi};
use crate::config::{ConfigResult, SessionConfig};
use crate::models::{ActiveSessionSnapshot, ExerciseHistoryEntry, NewSet, StartedSession};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use url::Url;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest<'a> {
    plan_id: &'a str,
}

pub struct HttpWorkoutApi {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl HttpWorkoutApi {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: RwLock::new(None),
        }
    }

    /// Validates the configured URL before building the client.
    pub fn from_config(config: &SessionConfig) -> ConfigResult<Self> {
        let api_url = config.api_url()?;
        Ok(Self::new(api_url.as_str(), config.api_key.clone()))
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = Some(token.into()),
            Err(_) => tracing::error!("Access token lock poisoned"),
        }
    }

    pub fn clear_access_token(&self) {
        if let Ok(mut guard) = self.access_token.write() {
            *guard = None;
        }
    }

    /// Appends each segment percent-encoded, so ids cannot add path levels,
    /// a query or a fragment.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        if let Some(bad) = segments
            .iter()
            .copied()
            .find(|segment| matches!(*segment, "" | "." | ".."))
        {
            return Err(ApiError::InvalidPath(format!("segment {bad:?}")));
        }
        let mut url = Url::parse(&self.api_url)
            .map_err(|err| ApiError::InvalidPath(format!("{}: {err}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidPath(format!("{} cannot be a base", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Attaches key and bearer token; no token means no request at all.
    fn authorized(&self, builder: RequestBuilder) -> ApiResult<RequestBuilder> {
        let token = self
            .access_token
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(ApiError::NotAuthenticated)?;
        Ok(builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/json"))
    }

    async fn check(&self, response: Response, operation: &str) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::NotAuthenticated),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            StatusCode::CONFLICT => Err(ApiError::Conflict(format!(
                "{operation} ({body_summary})"
            ))),
            _ => {
                tracing::error!(
                    status = %status,
                    body_summary = %body_summary,
                    operation,
                    "Workout API request failed"
                );
                Err(ApiError::Status {
                    status: status.as_u16(),
                    message: format!("{operation} failed ({body_summary})"),
                })
            }
        }
    }
}

#[async_trait]
impl WorkoutApi for HttpWorkoutApi {
    async fn start_session(&self, plan_id: &str) -> ApiResult<StartedSession> {
        let request = self.authorized(
            self.http_client
                .post(self.url(&["workout-sessions"])?)
                .json(&StartSessionRequest { plan_id }),
        )?;
        tracing::debug!(plan_id, "Starting workout session");
        let response = self.check(request.send().await?, "start session").await?;
        Ok(response.json().await?)
    }

    async fn add_set(&self, session_id: &str, set: &NewSet) -> ApiResult<()> {
        let request = self.authorized(
            self.http_client
                .post(self.url(&["workout-sessions", session_id, "sets"])?)
                .json(set),
        )?;
        tracing::debug!(
            session_id,
            exercise_ref = %set.exercise_ref,
            set_number = set.set_number,
            "Submitting set"
        );
        self.check(request.send().await?, "add set").await?;
        Ok(())
    }

    async fn finish_session(&self, session_id: &str) -> ApiResult<()> {
        let request = self.authorized(
            self.http_client
                .post(self.url(&["workout-sessions", session_id, "finish"])?),
        )?;
        self.check(request.send().await?, "finish session").await?;
        Ok(())
    }

    async fn get_active_session(&self, user_id: &str) -> ApiResult<Option<ActiveSessionSnapshot>> {
        let request = self.authorized(
            self.http_client
                .get(self.url(&["workout-sessions", "active"])?)
                .query(&[("userId", user_id)]),
        )?;
        match self.check(request.send().await?, "get active session").await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(ApiError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_exercise_history(
        &self,
        exercise_ref: &str,
    ) -> ApiResult<Vec<ExerciseHistoryEntry>> {
        let request = self.authorized(
            self.http_client
                .get(self.url(&["exercises", exercise_ref, "history"])?),
        )?;
        match self.check(request.send().await?, "get exercise history").await {
            Ok(response) => Ok(response.json().await?),
            Err(ApiError::NotFound) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{summarize_response_body, HttpWorkoutApi};
    use crate::api::{ApiError, WorkoutApi};
    use crate::config::SessionConfig;
    use crate::models::NewSet;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Answers every request with `status` and `body`, recording request lines.
    async fn canned_server(
        status: &'static str,
        body: &'static str,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let addr = listener.local_addr().expect("addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let request_line = read_request(&mut stream).await;
                seen.lock().expect("requests").push(request_line);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{addr}/api"), requests)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.expect("read request");
            if n == 0 {
                break buf.len();
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.expect("read body");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        head.lines().next().unwrap_or_default().to_string()
    }

    async fn signed_in(
        status: &'static str,
        body: &'static str,
    ) -> (HttpWorkoutApi, Arc<Mutex<Vec<String>>>) {
        let (base, requests) = canned_server(status, body).await;
        let api = HttpWorkoutApi::new(base, "key");
        api.set_access_token("token");
        (api, requests)
    }

    fn sample_set() -> NewSet {
        NewSet {
            exercise_ref: "e-1".to_string(),
            set_number: 2,
            reps: 8,
            weight: 60.0,
            rest_seconds: Some(90),
        }
    }

    #[test]
    fn url_joins_without_double_slash() {
        let api = HttpWorkoutApi::new("https://api.example.com/", "key");
        assert_eq!(
            api.url(&["workout-sessions"]).expect("url").as_str(),
            "https://api.example.com/workout-sessions"
        );
    }

    #[test]
    fn ids_with_reserved_characters_stay_in_one_segment() {
        let api = HttpWorkoutApi::new("https://api.example.com/v1", "key");
        let url = api
            .url(&["exercises", "../admin?x=1#", "history"])
            .expect("url");
        assert_eq!(url.path(), "/v1/exercises/..%2Fadmin%3Fx=1%23/history");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        for bad in ["", ".", ".."] {
            assert!(matches!(
                api.url(&["workout-sessions", bad, "finish"]),
                Err(ApiError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn body_summary_hides_content() {
        let summary = summarize_response_body("secret token here");
        assert!(summary.starts_with("len=17,digest="));
        assert!(!summary.contains("secret"));
    }

    #[test]
    fn from_config_rejects_bad_url() {
        let config = SessionConfig {
            api_url: "localhost api".to_string(),
            ..SessionConfig::default()
        };
        assert!(HttpWorkoutApi::from_config(&config).is_err());

        let config = SessionConfig {
            api_url: "https://api.example.com/v1/".to_string(),
            ..SessionConfig::default()
        };
        let api = HttpWorkoutApi::from_config(&config).expect("valid url");
        assert_eq!(
            api.url(&["exercises", "e-1", "history"]).expect("url").as_str(),
            "https://api.example.com/v1/exercises/e-1/history"
        );
    }

    #[tokio::test]
    async fn calls_without_token_fail_before_sending() {
        let api = HttpWorkoutApi::new("http://127.0.0.1:9", "key");
        let err = api
            .get_active_session("user-1")
            .await
            .expect_err("no token");
        assert!(matches!(err, ApiError::NotAuthenticated));

        api.set_access_token("token");
        api.clear_access_token();
        let err = api.finish_session("s-1").await.expect_err("cleared token");
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    #[tokio::test]
    async fn started_session_is_decoded() {
        let (api, requests) = signed_in("201 Created", r#"{"sessionId":"s-9"}"#).await;
        let started = api.start_session("plan-1").await.expect("start");
        assert_eq!(started.session_id, "s-9");
        assert_eq!(
            requests.lock().expect("requests").as_slice(),
            ["POST /api/workout-sessions HTTP/1.1"]
        );
    }

    #[tokio::test]
    async fn unauthorized_and_forbidden_map_to_not_authenticated() {
        for status in ["401 Unauthorized", "403 Forbidden"] {
            let (api, _) = signed_in(status, "{}").await;
            let err = api.finish_session("s-1").await.expect_err(status);
            assert!(matches!(err, ApiError::NotAuthenticated), "{status}: {err}");
        }
    }

    #[tokio::test]
    async fn not_found_means_no_active_session_or_history() {
        let (api, requests) = signed_in("404 Not Found", "{}").await;
        assert!(api.get_active_session("u-1").await.expect("active").is_none());
        assert!(api
            .get_exercise_history("e-1")
            .await
            .expect("history")
            .is_empty());
        assert!(matches!(
            api.finish_session("s-1").await,
            Err(ApiError::NotFound)
        ));
        assert_eq!(
            requests.lock().expect("requests")[1],
            "GET /api/exercises/e-1/history HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn duplicate_set_maps_to_conflict() {
        let (api, requests) = signed_in("409 Conflict", r#"{"error":"duplicate set"}"#).await;
        let err = api
            .add_set("s-1", &sample_set())
            .await
            .expect_err("conflict");
        assert!(matches!(err, ApiError::Conflict(_)), "{err}");
        assert_eq!(
            requests.lock().expect("requests").as_slice(),
            ["POST /api/workout-sessions/s-1/sets HTTP/1.1"]
        );
    }

    #[tokio::test]
    async fn other_statuses_carry_code_and_digest_only() {
        let (api, _) = signed_in("503 Service Unavailable", "internal secret detail").await;
        let err = api.add_set("s-1", &sample_set()).await.expect_err("503");
        match &err {
            ApiError::Status { status, message } => {
                assert_eq!(*status, 503);
                assert!(message.contains("len=22,digest="), "{message}");
                assert!(!message.contains("secret"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_transient());

        let (api, _) = signed_in("422 Unprocessable Entity", "{}").await;
        let err = api.start_session("plan-1").await.expect_err("422");
        assert!(matches!(err, ApiError::Status { status: 422, .. }));
        assert!(!err.is_transient());
    }
}
