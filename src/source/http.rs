//! Remote REST client
//!
//! Talks to the classic JSON API with HTTP basic auth. Every listing endpoint
//! returns an array of single-key envelopes, see [`super::decode`].

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::decode::decode_list;
use super::{HarvestSource, Modules};
use crate::error::SourceError;
use crate::model::{EntityKind, Record};
use crate::sync::DateWindow;

const WINDOW_DATE_FORMAT: &str = "%Y%m%d";

/// HTTP implementation of [`HarvestSource`].
pub struct HarvestClient {
    client: Client,
    base_url: Url,
    user: String,
    password: String,
}

#[derive(Deserialize)]
struct WhoAmI {
    company: Company,
}

#[derive(Deserialize)]
struct Company {
    #[serde(default)]
    modules: Option<Modules>,
}

impl HarvestClient {
    /// Create a client for an account URI such as `https://acme.harvestapp.com`.
    pub fn new(domain: &str, user: impl Into<String>, password: impl Into<String>) -> Result<Self, SourceError> {
        let base_url = Url::parse(domain.trim_end_matches('/'))
            .map_err(|e| SourceError::InvalidUri(format!("{}: {}", domain, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(SourceError::InvalidUri(domain.to_string()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("harvest-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            user: user.into().trim().to_string(),
            password: password.into(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, SourceError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path)).map_err(|e| SourceError::InvalidUri(e.to_string()))
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value, SourceError> {
        let url = self.url(path)?;
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SourceError::Decode(format!("{}: {}", url, e)))
    }

    async fn get_records(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Record>, SourceError> {
        decode_list(self.get_json(path, query).await?)
    }
}

#[async_trait]
impl HarvestSource for HarvestClient {
    async fn modules(&self) -> Result<Modules, SourceError> {
        let payload = self.get_json("/account/who_am_i", &[]).await?;
        let who: WhoAmI = serde_json::from_value(payload)
            .map_err(|e| SourceError::Decode(format!("who_am_i: {}", e)))?;
        Ok(who.company.modules.unwrap_or_default())
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<Record>, SourceError> {
        let path = match kind {
            EntityKind::User => "/people",
            EntityKind::Client => "/clients",
            EntityKind::Task => "/tasks",
            EntityKind::Invoice => "/invoices",
            EntityKind::Project => "/projects",
            other => {
                return Err(SourceError::Unsupported(format!("{} is fetched per project", other)));
            }
        };
        self.get_records(path, &[]).await
    }

    async fn fetch_for_parent(&self, kind: EntityKind, parent_id: i64) -> Result<Vec<Record>, SourceError> {
        let path = match kind {
            EntityKind::TaskAssignment => format!("/projects/{}/task_assignments", parent_id),
            EntityKind::Expense => format!("/projects/{}/expenses", parent_id),
            other => {
                return Err(SourceError::Unsupported(format!("{} is not fetched per project", other)));
            }
        };
        self.get_records(&path, &[]).await
    }

    async fn fetch_windowed(
        &self,
        kind: EntityKind,
        parent_id: i64,
        window: DateWindow,
    ) -> Result<Vec<Record>, SourceError> {
        if kind != EntityKind::DayEntry {
            return Err(SourceError::Unsupported(format!("{} is not windowed", kind)));
        }
        let query = [
            ("from", window.from.format(WINDOW_DATE_FORMAT).to_string()),
            ("to", window.to.format(WINDOW_DATE_FORMAT).to_string()),
        ];
        self.get_records(&format!("/projects/{}/entries", parent_id), &query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_uri_without_scheme_or_host() {
        assert!(matches!(
            HarvestClient::new("acme.harvestapp.com", "u", "p"),
            Err(SourceError::InvalidUri(_))
        ));
        assert!(matches!(
            HarvestClient::new("file:///tmp/x", "u", "p"),
            Err(SourceError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_builds_endpoint_urls() {
        let client = HarvestClient::new("https://acme.harvestapp.com/", "u", "p").unwrap();
        assert_eq!(
            client.url("/projects/7/entries").unwrap().as_str(),
            "https://acme.harvestapp.com/projects/7/entries"
        );
    }
}
