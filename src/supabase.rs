use crate::config::{STORAGE_BUCKET, SUPABASE_SERVICE_KEY, SUPABASE_URL};
use crate::http::{build_client, server_message};
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use urlencoding::encode;

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    bucket: String,
    http: Client,
}

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or("no detail"))]
    Status { status: u16, message: Option<String> },
    #[error("invalid response: {0}")]
    Deserialize(String),
}

impl SupabaseError {
    pub fn server_message(&self) -> Option<&str> {
        match self {
            SupabaseError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentProfileRow {
    #[allow(dead_code)]
    pub account_id: String,
    #[serde(default)]
    pub verification_status: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, service_key: &str, bucket: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
            http: build_client(),
        }
    }

    pub fn from_env() -> Option<Self> {
        let base_url = SUPABASE_URL.as_deref()?;
        let service_key = SUPABASE_SERVICE_KEY.as_deref()?;
        Some(Self::new(base_url, service_key, &STORAGE_BUCKET))
    }

    fn object_path(path: &str) -> String {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            Self::object_path(path)
        )
    }

    /// Stores `data` at `path` in the media bucket and returns its public URL.
    pub async fn upload_object(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, SupabaseError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            Self::object_path(path)
        );
        let response = self
            .http
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Status {
                status: status.as_u16(),
                message: server_message(&body),
            });
        }
        Ok(self.public_url(path))
    }

    pub async fn fetch_agent_profile(
        &self,
        account_id: &str,
    ) -> Result<Option<AgentProfileRow>, SupabaseError> {
        let url = format!(
            "{}/rest/v1/agent_profiles?account_id=eq.{}&select=*&limit=1",
            self.base_url,
            encode(account_id)
        );
        let response = self
            .http
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Status {
                status: status.as_u16(),
                message: server_message(&body),
            });
        }

        let mut rows: Vec<AgentProfileRow> = response
            .json()
            .await
            .map_err(|err| SupabaseError::Deserialize(err.to_string()))?;
        Ok(rows.pop())
    }
}
