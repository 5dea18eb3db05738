//! Where the entity list comes from.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tagmatrix_common::Entity;

use crate::error::SourceError;

const DEFAULT_API_URL: &str = "https://api.steampowered.com";
const PAGE_SIZE: u32 = 50_000;

/// One page of `IStoreService/GetAppList/v1`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AppListPage {
    #[serde(default)]
    pub apps: Vec<Entity>,
    #[serde(default)]
    pub have_more_results: bool,
    #[serde(default)]
    pub last_appid: u64,
}

#[derive(Deserialize)]
struct AppListEnvelope {
    #[serde(default)]
    response: AppListPage,
}

pub fn parse_app_list_page(body: &str) -> Result<AppListPage, SourceError> {
    let envelope: AppListEnvelope =
        serde_json::from_str(body).map_err(|source| SourceError::Json {
            what: "GetAppList response".to_string(),
            source,
        })?;
    Ok(envelope.response)
}

/// Pages through the store's app list, games only.
pub struct SteamAppList {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SteamAppList {
    pub fn new(api_key: impl Into<String>, request_timeout: Duration) -> Result<Self, SourceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SourceError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| SourceError::Http {
                url: DEFAULT_API_URL.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn page_url(&self, after: Option<u64>) -> String {
        let mut url = format!(
            "{}/IStoreService/GetAppList/v1/?include_games=true&include_dlc=false\
             &include_software=false&include_videos=false&include_hardware=false\
             &max_results={PAGE_SIZE}&key={}",
            self.base_url, self.api_key
        );
        if let Some(last) = after {
            url.push_str(&format!("&last_appid={last}"));
        }
        url
    }

    async fn page(&self, after: Option<u64>) -> Result<AppListPage, SourceError> {
        let url = self.page_url(after);
        // the key is part of the query; keep it out of errors and logs
        let shown = format!("{}/IStoreService/GetAppList/v1/", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| SourceError::Http {
                url: shown.clone(),
                source: source.without_url(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: shown,
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(|source| SourceError::Http {
            url: shown,
            source: source.without_url(),
        })?;
        parse_app_list_page(&body)
    }

    /// Fetch every page, stopping early once `limit` entities are known.
    pub async fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Entity>, SourceError> {
        let mut entities = Vec::new();
        let mut after = None;
        loop {
            let page = self.page(after).await?;
            entities.extend(page.apps);
            tracing::info!(
                last_appid = page.last_appid,
                total = entities.len(),
                "obtained games up to id"
            );
            if limit.is_some_and(|n| entities.len() >= n) {
                break;
            }
            // a cursor that does not move would loop forever
            if !page.have_more_results || after == Some(page.last_appid) {
                break;
            }
            after = Some(page.last_appid);
        }
        Ok(apply_limit(entities, limit))
    }
}

/// Read a JSON array of `{"appid": .., "name": ..}` objects.
pub fn load_entities_json(path: &Path) -> Result<Vec<Entity>, SourceError> {
    let body = std::fs::read_to_string(path)?;
    serde_json::from_str(&body).map_err(|source| SourceError::Json {
        what: path.display().to_string(),
        source,
    })
}

pub fn apply_limit(mut entities: Vec<Entity>, limit: Option<usize>) -> Vec<Entity> {
    if let Some(n) = limit {
        entities.truncate(n);
    }
    entities
}
