use anyhow::{Context, Result, anyhow, bail};
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("anishelf/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct TitleDetail {
    pub id: String,
    pub title: String,
    pub total_episodes: Option<u32>,
}

pub trait CatalogClient {
    async fn title_detail(&self, title_id: &str) -> Result<TitleDetail>;
}

/// Looks up every title at once and waits for all of them to settle.
/// A failed lookup yields `None` for that position and does not affect the others.
pub async fn fetch_details(
    catalog: &impl CatalogClient,
    ids: &[String],
) -> Vec<Option<TitleDetail>> {
    let lookups = ids.iter().map(|id| async move {
        match catalog.title_detail(id).await {
            Ok(detail) if !detail.title.trim().is_empty() => {
                if detail.id != *id {
                    debug!(
                        title_id = %id,
                        catalog_id = %detail.id,
                        "catalog answered with another id"
                    );
                }
                Some(detail)
            }
            Ok(_) => {
                warn!(title_id = %id, "catalog returned an empty title");
                None
            }
            Err(err) => {
                warn!(title_id = %id, error = %format!("{err:#}"), "title lookup failed");
                None
            }
        }
    });
    join_all(lookups).await
}

pub async fn fetch_titles(catalog: &impl CatalogClient, ids: &[String]) -> Vec<Option<String>> {
    fetch_details(catalog, ids)
        .await
        .into_iter()
        .map(|detail| detail.map(|detail| detail.title))
        .collect()
}

pub struct RestCatalogClient {
    client: Client,
    base_url: Url,
}

impl RestCatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid catalog URL {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("catalog URL {base_url} cannot carry a path");
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to create catalog HTTP client")?;
        base_url.set_query(None);
        Ok(Self { client, base_url })
    }

    fn detail_url(&self, title_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("catalog URL {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .push("info")
            .push(title_id);
        Ok(url)
    }
}

impl CatalogClient for RestCatalogClient {
    async fn title_detail(&self, title_id: &str) -> Result<TitleDetail> {
        let url = self.detail_url(title_id)?;
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("request failed for {url}"))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("failed to read catalog response for {title_id}"))?;
        if !status.is_success() {
            let body: String = text.trim().chars().take(240).collect();
            bail!("catalog HTTP {status}: {body}");
        }
        let payload: DetailPayload = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse catalog detail for {title_id}"))?;
        Ok(payload.into_detail(title_id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<TitleText>,
    #[serde(default)]
    total_episodes: Option<u32>,
}

/// Some catalog sources send a plain string, others a per-language object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TitleText {
    Plain(String),
    Localized {
        #[serde(default)]
        english: Option<String>,
        #[serde(default)]
        romaji: Option<String>,
        #[serde(default)]
        native: Option<String>,
    },
}

impl TitleText {
    fn best(self) -> String {
        match self {
            TitleText::Plain(title) => title,
            TitleText::Localized {
                english,
                romaji,
                native,
            } => [english, romaji, native]
                .into_iter()
                .flatten()
                .find(|title| !title.trim().is_empty())
                .unwrap_or_default(),
        }
    }
}

impl DetailPayload {
    fn into_detail(self, requested_id: &str) -> TitleDetail {
        TitleDetail {
            id: self.id.unwrap_or_else(|| requested_id.to_string()),
            title: self.title.map(TitleText::best).unwrap_or_default(),
            total_episodes: self.total_episodes,
        }
    }
}
