//! Supabase PostgREST relay.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::relay::{
    Relay, RelayError, RelayResult, RelayWrite, RemoteRecord, Subscription, SyncIdentity,
};
use crate::util::{failure_message, http_base_url};

/// Default table holding one row per user
pub const DEFAULT_RELAY_TABLE: &str = "user_state";

/// PostgREST error codes meaning the relay table does not exist
const MISSING_TABLE_CODES: [&str; 2] = ["PGRST205", "42P01"];

/// Relay backed by a Supabase table accessed through PostgREST.
///
/// Row-level security is expected to restrict every row to its owner, so
/// requests carry the user's access token. This relay has no realtime
/// channel; sessions fall back to polling.
#[derive(Debug, Clone)]
pub struct SupabaseRelay {
    rest_url: String,
    anon_key: String,
    table: String,
    client: Client,
}

impl SupabaseRelay {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        table: impl Into<String>,
        timeout: Duration,
    ) -> RelayResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RelayError::InvalidConfiguration(
                "Supabase anon key must not be empty".to_string(),
            ));
        }
        let table = table.into().trim().to_string();
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RelayError::InvalidConfiguration(format!(
                "Invalid relay table name '{table}'"
            )));
        }

        Ok(Self {
            rest_url,
            anon_key,
            table,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.rest_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder, identity: &SyncIdentity) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", identity.access_token))
    }
}

impl Relay for SupabaseRelay {
    async fn upsert(&self, identity: &SyncIdentity, write: &RelayWrite) -> RelayResult<()> {
        let row = RelayRow {
            user_id: &identity.user_id,
            snapshot: &write.snapshot,
            logical_ts: write.logical_timestamp,
            device_id: &write.device_id,
        };
        let request = self
            .client
            .post(format!("{}?on_conflict=user_id", self.table_url()))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);

        let response = self.authorized(request, identity).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }
        Ok(())
    }

    async fn select(&self, identity: &SyncIdentity) -> RelayResult<Option<RemoteRecord>> {
        let url = format!(
            "{}?select=snapshot,logical_ts,device_id,updated_at&user_id=eq.{}&limit=1",
            self.table_url(),
            urlencoding::encode(&identity.user_id)
        );
        let request = self.client.get(url).header("Accept", "application/json");

        let response = self.authorized(request, identity).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let body = response.text().await?;
        let rows: Vec<RelayRowResponse> = serde_json::from_str(&body)
            .map_err(|error| RelayError::InvalidPayload(error.to_string()))?;
        Ok(rows.into_iter().next().map(RemoteRecord::from))
    }

    async fn subscribe(&self, _identity: &SyncIdentity) -> RelayResult<Option<Subscription>> {
        Ok(None)
    }
}

#[derive(Debug, Serialize)]
struct RelayRow<'a> {
    user_id: &'a str,
    snapshot: &'a Value,
    logical_ts: i64,
    device_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayRowResponse {
    #[serde(default)]
    snapshot: Value,
    logical_ts: i64,
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    updated_at: Option<String>,
}

impl From<RelayRowResponse> for RemoteRecord {
    fn from(value: RelayRowResponse) -> Self {
        Self {
            snapshot: value.snapshot,
            logical_timestamp: value.logical_ts,
            device_id: value.device_id,
            server_updated_at: value.updated_at,
        }
    }
}

pub fn normalize_rest_url(url: &str) -> RelayResult<String> {
    if url.trim().is_empty() {
        return Err(RelayError::InvalidConfiguration(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    let Some(base) = http_base_url(url) else {
        return Err(RelayError::InvalidConfiguration(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    };
    if base.ends_with("/rest/v1") {
        Ok(base)
    } else {
        Ok(format!("{base}/rest/v1"))
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn classify_error(status: StatusCode, body: &str) -> RelayError {
    let payload = serde_json::from_str::<PostgrestErrorResponse>(body).ok();
    let payload_message = payload.as_ref().and_then(|payload| {
        payload
            .message
            .clone()
            .or_else(|| payload.details.clone())
            .or_else(|| payload.hint.clone())
    });
    let message = failure_message(status.as_u16(), payload_message, body);

    let code = payload.as_ref().and_then(|payload| payload.code.as_deref());
    let missing_table = code.is_some_and(|code| MISSING_TABLE_CODES.contains(&code))
        || message.contains("does not exist")
        || message.contains("Could not find the table");

    if missing_table {
        RelayError::SchemaMissing(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        RelayError::Unauthorized(message)
    } else {
        RelayError::Api(message)
    }
}
