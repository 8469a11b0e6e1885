use crate::config::{LISTINGS_API_TOKEN, LISTINGS_API_URL};
use crate::http::{build_client, server_message};
use crate::supabase::SupabaseClient;
use crate::wizard::media::MediaFile;
use crate::wizard::payload::ListingPayload;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const SUBMISSION_FALLBACK: &str = "Failed to create listing. Please try again.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("upload of `{path}` failed: {detail}")]
    Upload {
        path: String,
        detail: String,
        message: Option<String>,
    },
    #[error("listing rejected with HTTP {status}")]
    Rejected { status: u16, message: Option<String> },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl GatewayError {
    pub fn server_message(&self) -> Option<&str> {
        match self {
            GatewayError::Upload { message, .. } | GatewayError::Rejected { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// The string shown to the person submitting.
    pub fn reason(&self) -> String {
        self.server_message()
            .unwrap_or(SUBMISSION_FALLBACK)
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// File storage plus listing creation, as seen by the wizard.
#[async_trait]
pub trait ListingGateway: Send + Sync {
    async fn upload(&self, file: &MediaFile, destination: &str) -> Result<String, GatewayError>;

    async fn create_listing(&self, payload: &ListingPayload)
    -> Result<ListingReceipt, GatewayError>;
}

/// Supabase storage for media and the listings REST API for records.
#[derive(Debug, Clone)]
pub struct RestGateway {
    storage: Option<SupabaseClient>,
    listings_url: Option<String>,
    token: Option<String>,
    http: Client,
}

impl RestGateway {
    pub fn new(
        storage: Option<SupabaseClient>,
        listings_url: Option<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            storage,
            listings_url,
            token,
            http: build_client(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            SupabaseClient::from_env(),
            LISTINGS_API_URL.clone(),
            LISTINGS_API_TOKEN.clone(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.storage.is_some() && self.listings_url.is_some()
    }
}

#[async_trait]
impl ListingGateway for RestGateway {
    async fn upload(&self, file: &MediaFile, destination: &str) -> Result<String, GatewayError> {
        let storage = self
            .storage
            .as_ref()
            .ok_or(GatewayError::NotConfigured("media storage"))?;
        debug!(target = "listing.gateway", path = destination, bytes = file.data.len(), "uploading media");
        storage
            .upload_object(destination, &file.content_type, file.data.clone())
            .await
            .map_err(|err| GatewayError::Upload {
                path: destination.to_string(),
                message: err.server_message().map(str::to_string),
                detail: err.to_string(),
            })
    }

    async fn create_listing(
        &self,
        payload: &ListingPayload,
    ) -> Result<ListingReceipt, GatewayError> {
        let base = self
            .listings_url
            .as_deref()
            .ok_or(GatewayError::NotConfigured("listings API"))?;
        let mut request = self.http.post(format!("{base}/properties")).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: server_message(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(ListingReceipt::default());
        }
        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }
}
