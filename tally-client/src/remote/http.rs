//! HTTP remote speaking PostgREST RPC.
//!
//! Every procedure is `POST {base_url}/rest/v1/rpc/{name}` with a JSON body.
//! Mutations send the stored payload as-is; the server deduplicates on
//! `client_event_id` and reports a duplicate as a unique violation.

use super::{ApplyOutcome, RemoteApi, RpcError};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_types::{
    ActionKind, ActivityRecord, LogActivityPayload, PageRequest, RecordId, RecordTimestamp,
    RespondToInvitePayload, SendFriendRequestPayload,
};

/// Procedure serving activity history.
pub const HISTORY_PROCEDURE: &str = "get_activity_history";

/// SQLSTATE for a unique-key violation.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE raised by `RAISE EXCEPTION` in a procedure.
const RAISE_EXCEPTION: &str = "P0001";

/// Remote backed by a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryParams<'a> {
    p_limit: u32,
    p_before_ts: Option<RecordTimestamp>,
    p_before_id: Option<RecordId>,
    p_challenge_id: Option<&'a str>,
}

impl HttpRemote {
    /// Build a remote from configuration.
    pub fn new(config: &RemoteConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.call_timeout_secs))
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// URL of a remote procedure.
    pub fn rpc_url(&self, procedure: &str) -> String {
        rpc_url(&self.base_url, procedure)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        procedure: &str,
        body: &B,
    ) -> Result<(u16, String), RpcError> {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        tracing::debug!("POST rpc/{}", procedure);

        let response = self
            .client
            .post(self.rpc_url(procedure))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_error)?;
        Ok((status, text))
    }

    async fn mutate<B: Serialize + ?Sized>(
        &self,
        procedure: &str,
        body: &B,
    ) -> Result<ApplyOutcome, RpcError> {
        let (status, text) = self.post(procedure, body).await?;
        if (200..300).contains(&status) {
            return Ok(ApplyOutcome::Applied);
        }
        classify_failure(status, &text)
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn log_activity(&self, payload: &LogActivityPayload) -> Result<ApplyOutcome, RpcError> {
        self.mutate(ActionKind::LogActivity.procedure(), payload).await
    }

    async fn respond_to_invite(
        &self,
        payload: &RespondToInvitePayload,
    ) -> Result<ApplyOutcome, RpcError> {
        self.mutate(ActionKind::RespondToInvite.procedure(), payload).await
    }

    async fn send_friend_request(
        &self,
        payload: &SendFriendRequestPayload,
    ) -> Result<ApplyOutcome, RpcError> {
        self.mutate(ActionKind::SendFriendRequest.procedure(), payload).await
    }

    async fn fetch_activity_page(
        &self,
        request: &PageRequest,
    ) -> Result<Vec<ActivityRecord>, RpcError> {
        let params = history_params(request);
        let (status, text) = self.post(HISTORY_PROCEDURE, &params).await?;

        if !(200..300).contains(&status) {
            return Err(match classify_failure(status, &text) {
                Err(e) => e,
                // A duplicate signal means nothing for a read.
                Ok(_) => RpcError::Server {
                    status,
                    message: text,
                },
            });
        }

        serde_json::from_str(&text).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

fn rpc_url(base_url: &str, procedure: &str) -> String {
    format!("{}/rest/v1/rpc/{}", base_url.trim_end_matches('/'), procedure)
}

fn history_params(request: &PageRequest) -> HistoryParams<'_> {
    HistoryParams {
        p_limit: request.limit,
        p_before_ts: request.cursor.map(|c| c.before_timestamp),
        p_before_id: request.cursor.map(|c| c.before_id),
        p_challenge_id: request.challenge_id.as_deref(),
    }
}

fn transport_error(e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::Timeout
    } else {
        RpcError::Transport(e.to_string())
    }
}

/// Map a non-2xx response to an outcome.
///
/// - SQLSTATE 23505, or a 409 with no code: the key was already applied
/// - 400, 404, 409, 422, SQLSTATE class 22/23, P0001: permanent rejection
/// - anything else (408, 429, 401, 403, 5xx): transient
fn classify_failure(status: u16, body: &str) -> Result<ApplyOutcome, RpcError> {
    let error: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let code = error.code.unwrap_or_default();
    let message = error.message.unwrap_or_else(|| body.to_string());

    // PostgREST also answers 409 for foreign-key violations, so only the
    // code identifies a duplicate.
    if code == UNIQUE_VIOLATION || (status == 409 && code.is_empty()) {
        return Ok(ApplyOutcome::AlreadyApplied);
    }

    let permanent_code =
        code == RAISE_EXCEPTION || code.starts_with("22") || code.starts_with("23");
    if permanent_code || matches!(status, 400 | 404 | 409 | 422) {
        let code = if code.is_empty() {
            status.to_string()
        } else {
            code
        };
        return Err(RpcError::Rejected { code, message });
    }

    Err(RpcError::Server { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_types::Cursor;

    fn pg_error(code: &str, message: &str) -> String {
        json!({"code": code, "message": message, "details": null, "hint": null}).to_string()
    }

    #[test]
    fn url_joins_base_and_procedure() {
        assert_eq!(
            rpc_url("https://project.example.co/", "log_activity"),
            "https://project.example.co/rest/v1/rpc/log_activity"
        );
    }

    #[test]
    fn conflict_status_is_already_applied() {
        assert_eq!(classify_failure(409, ""), Ok(ApplyOutcome::AlreadyApplied));
    }

    #[test]
    fn conflict_with_foreign_key_code_is_rejected() {
        let body = pg_error("23503", "insert violates foreign key constraint");
        assert_eq!(
            classify_failure(409, &body),
            Err(RpcError::Rejected {
                code: "23503".into(),
                message: "insert violates foreign key constraint".into()
            })
        );
    }

    #[test]
    fn conflict_with_unique_code_is_already_applied() {
        let body = pg_error("23505", "duplicate key value violates unique constraint");
        assert_eq!(
            classify_failure(409, &body),
            Ok(ApplyOutcome::AlreadyApplied)
        );
    }

    #[test]
    fn unique_violation_is_already_applied() {
        let body = pg_error("23505", "duplicate key value violates unique constraint");
        assert_eq!(
            classify_failure(400, &body),
            Ok(ApplyOutcome::AlreadyApplied)
        );
    }

    #[test]
    fn raised_exception_is_rejected() {
        let body = pg_error("P0001", "challenge has ended");
        assert_eq!(
            classify_failure(400, &body),
            Err(RpcError::Rejected {
                code: "P0001".into(),
                message: "challenge has ended".into()
            })
        );
    }

    #[test]
    fn constraint_classes_are_rejected() {
        for code in ["22P02", "23503", "23514"] {
            let err = classify_failure(400, &pg_error(code, "bad")).unwrap_err();
            assert!(err.is_permanent(), "{}", code);
        }
    }

    #[test]
    fn client_statuses_without_body_are_rejected() {
        for status in [400, 404, 422] {
            let err = classify_failure(status, "").unwrap_err();
            assert_eq!(
                err,
                RpcError::Rejected {
                    code: status.to_string(),
                    message: String::new()
                }
            );
        }
    }

    #[test]
    fn transient_statuses_are_retried() {
        for status in [401, 403, 408, 429, 500, 502, 503] {
            let err = classify_failure(status, "try later").unwrap_err();
            assert!(!err.is_permanent(), "{}", status);
            assert!(matches!(err, RpcError::Server { .. }));
        }
    }

    #[test]
    fn history_params_carry_full_precision_cursor() {
        let ts = RecordTimestamp::parse("2024-05-01T10:00:00.123456Z").unwrap();
        let request = PageRequest {
            limit: 20,
            cursor: Some(Cursor::new(ts, RecordId::from_u128(9))),
            challenge_id: Some("c1".into()),
        };

        let value = serde_json::to_value(history_params(&request)).unwrap();
        assert_eq!(value["p_limit"], 20);
        assert_eq!(value["p_before_ts"], "2024-05-01T10:00:00.123456Z");
        assert_eq!(
            value["p_before_id"],
            "00000000-0000-0000-0000-000000000009"
        );
        assert_eq!(value["p_challenge_id"], "c1");
    }

    #[test]
    fn first_page_sends_null_cursor() {
        let request = PageRequest {
            limit: 5,
            cursor: None,
            challenge_id: None,
        };
        let value = serde_json::to_value(history_params(&request)).unwrap();
        assert!(value["p_before_ts"].is_null());
        assert!(value["p_before_id"].is_null());
    }

    #[test]
    fn new_trims_trailing_slash() {
        let config = RemoteConfig {
            base_url: "https://project.example.co/".into(),
            ..RemoteConfig::default()
        };
        let remote = HttpRemote::new(&config).unwrap();
        assert_eq!(
            remote.rpc_url("respond_to_invite"),
            "https://project.example.co/rest/v1/rpc/respond_to_invite"
        );
    }
}
