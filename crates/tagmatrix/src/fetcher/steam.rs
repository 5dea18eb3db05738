//! Steam store and SteamSpy backed fetcher.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::COOKIE;
use serde::Deserialize;
use tagmatrix_common::{Entity, FetchResult};

use super::DataFetcher;
use crate::error::FetchError;

/// Cookies that get the store past the age check.
const AGE_GATE_COOKIE: &str = "birthtime=946706401; lastagecheckage=1-January-2000";

const DEFAULT_STORE_URL: &str = "https://store.steampowered.com";
const DEFAULT_STEAMSPY_URL: &str = "https://steamspy.com";

/// Base URLs, overridable so tests can point at a local server.
#[derive(Clone, Debug)]
pub struct SteamEndpoints {
    pub store: String,
    pub steamspy: String,
}

impl Default for SteamEndpoints {
    fn default() -> Self {
        Self {
            store: DEFAULT_STORE_URL.to_string(),
            steamspy: DEFAULT_STEAMSPY_URL.to_string(),
        }
    }
}

pub struct SteamFetcher {
    client: Client,
    endpoints: SteamEndpoints,
}

impl SteamFetcher {
    /// `request_timeout` bounds each individual HTTP request; the scheduler
    /// applies its own limit to the whole fetch.
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("tagmatrix/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            endpoints: SteamEndpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: SteamEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn get_text(&self, url: String, age_gate: bool) -> Result<String, FetchError> {
        let mut req = self.client.get(&url);
        if age_gate {
            req = req.header(COOKIE, AGE_GATE_COOKIE);
        }
        let response = req.send().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|source| FetchError::Http { url, source })
    }

    async fn release_date(&self, id: u64) -> Result<Option<String>, FetchError> {
        let url = format!(
            "{}/api/appdetails?appids={id}&filters=release_date",
            self.endpoints.store
        );
        let body = self.get_text(url, true).await?;
        parse_release_date(id, &body)
    }

    async fn review_summary(&self, id: u64) -> Result<ReviewSummary, FetchError> {
        let url = format!(
            "{}/appreviews/{id}?json=1&language=all&purchase_type=all&num_per_page=0",
            self.endpoints.store
        );
        let body = self.get_text(url, true).await?;
        parse_review_summary(&body)
    }

    async fn tags(&self, id: u64) -> Result<Vec<String>, FetchError> {
        let url = format!(
            "{}/api.php?request=appdetails&appid={id}",
            self.endpoints.steamspy
        );
        let body = self.get_text(url, false).await?;
        parse_steamspy_tags(&body)
    }

    async fn metadata(&self, id: u64) -> Result<Metadata, FetchError> {
        let (release, reviews) = tokio::join!(self.release_date(id), self.review_summary(id));
        merge_metadata(id, release, reviews)
    }
}

type Metadata = (Option<String>, ReviewSummary);

/// Either half of the metadata is enough; both failing fails the metadata.
fn merge_metadata(
    id: u64,
    release: Result<Option<String>, FetchError>,
    reviews: Result<ReviewSummary, FetchError>,
) -> Result<Metadata, FetchError> {
    match (release, reviews) {
        (Ok(date), Ok(summary)) => Ok((date, summary)),
        (Err(e), Ok(summary)) => {
            tracing::warn!(id, err = %e, "no release date");
            Ok((None, summary))
        }
        (Ok(date), Err(e)) => {
            tracing::warn!(id, err = %e, "no review summary");
            Ok((date, ReviewSummary::default()))
        }
        (Err(e), Err(_)) => Err(e),
    }
}

/// Combine the metadata and tag lookups. Only both failing is an error.
fn merge_fetch(
    entity: &Entity,
    metadata: Result<Metadata, FetchError>,
    tags: Result<Vec<String>, FetchError>,
) -> Result<FetchResult, FetchError> {
    let id = entity.id;
    let ((release_date, reviews), tags) = match (metadata, tags) {
        (Err(m), Err(t)) => {
            return Err(FetchError::Both {
                metadata: Box::new(m),
                tags: Box::new(t),
            });
        }
        (Ok(m), Err(e)) => {
            tracing::warn!(id, title = %entity.name, err = %e, "tags unavailable; recording metadata only");
            (m, Vec::new())
        }
        (Err(e), Ok(t)) => {
            tracing::warn!(id, title = %entity.name, err = %e, "metadata unavailable; recording tags only");
            ((None, ReviewSummary::default()), t)
        }
        (Ok(m), Ok(t)) => (m, t),
    };
    Ok(FetchResult {
        scraped_on: None,
        release_date,
        total_review_count: reviews.total,
        review_positivity: reviews.positivity,
        tags,
    })
}

impl DataFetcher for SteamFetcher {
    async fn fetch(&self, entity: &Entity) -> Result<FetchResult, FetchError> {
        let (metadata, tags) = tokio::join!(self.metadata(entity.id), self.tags(entity.id));
        merge_fetch(entity, metadata, tags)
    }
}

#[derive(Debug, Deserialize)]
struct AppDetailsEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<AppDetailsData>,
}

#[derive(Debug, Deserialize)]
struct AppDetailsData {
    release_date: Option<ReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    #[serde(default)]
    date: String,
}

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    #[serde(default)]
    success: i64,
    query_summary: Option<QuerySummary>,
}

#[derive(Debug, Deserialize)]
struct QuerySummary {
    total_reviews: Option<u64>,
    review_score_desc: Option<String>,
}

/// `tags` is a vote map, or `[]` for an app without tags.
#[derive(Debug, Deserialize)]
struct SteamSpyApp {
    #[serde(default)]
    tags: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ReviewSummary {
    pub total: Option<String>,
    pub positivity: Option<String>,
}

fn decode<'a, T: Deserialize<'a>>(what: &'static str, body: &'a str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode {
        what,
        message: e.to_string(),
    })
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn parse_release_date(id: u64, body: &str) -> Result<Option<String>, FetchError> {
    let mut envelopes: HashMap<String, AppDetailsEnvelope> = decode("appdetails", body)?;
    let envelope = envelopes
        .remove(&id.to_string())
        .ok_or(FetchError::NotFound(id))?;
    if !envelope.success {
        return Err(FetchError::NotFound(id));
    }
    Ok(envelope
        .data
        .and_then(|d| d.release_date)
        .and_then(|r| non_blank(r.date)))
}

pub(crate) fn parse_review_summary(body: &str) -> Result<ReviewSummary, FetchError> {
    let response: ReviewsResponse = decode("appreviews", body)?;
    if response.success != 1 {
        return Err(FetchError::Decode {
            what: "appreviews",
            message: format!("success = {}", response.success),
        });
    }
    let summary = response.query_summary.ok_or(FetchError::Decode {
        what: "appreviews",
        message: "missing query_summary".to_string(),
    })?;
    Ok(ReviewSummary {
        total: summary.total_reviews.map(|n| n.to_string()),
        positivity: summary.review_score_desc.and_then(non_blank),
    })
}

/// Tags by vote count, most voted first; ties broken by name.
pub(crate) fn parse_steamspy_tags(body: &str) -> Result<Vec<String>, FetchError> {
    let app: SteamSpyApp = decode("steamspy appdetails", body)?;
    let votes: HashMap<String, i64> = match app.tags {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(items) if items.is_empty() => return Ok(Vec::new()),
        map @ serde_json::Value::Object(_) => {
            serde_json::from_value(map).map_err(|e| FetchError::Decode {
                what: "steamspy tags",
                message: e.to_string(),
            })?
        }
        other => {
            return Err(FetchError::Decode {
                what: "steamspy tags",
                message: format!("expected a vote map, got {other}"),
            });
        }
    };
    let mut ranked: Vec<(String, i64)> = votes.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(ranked.into_iter().map(|(tag, _)| tag).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_date_from_appdetails() {
        let body = r#"{"620":{"success":true,"data":{"release_date":{"coming_soon":false,"date":"18 Apr, 2011"}}}}"#;
        assert_eq!(
            parse_release_date(620, body).unwrap().as_deref(),
            Some("18 Apr, 2011")
        );
    }

    #[test]
    fn unsuccessful_appdetails_is_not_found() {
        let body = r#"{"999":{"success":false}}"#;
        assert!(matches!(
            parse_release_date(999, body),
            Err(FetchError::NotFound(999))
        ));
        assert!(matches!(
            parse_release_date(1, body),
            Err(FetchError::NotFound(1))
        ));
    }

    #[test]
    fn blank_release_date_is_none() {
        let body = r#"{"5":{"success":true,"data":{"release_date":{"coming_soon":true,"date":"  "}}}}"#;
        assert_eq!(parse_release_date(5, body).unwrap(), None);
    }

    #[test]
    fn review_summary_fields() {
        let body = r#"{"success":1,"query_summary":{"num_reviews":0,"review_score":9,
            "review_score_desc":"Overwhelmingly Positive","total_positive":300000,
            "total_negative":2000,"total_reviews":302000},"reviews":[],"cursor":"*"}"#;
        let summary = parse_review_summary(body).unwrap();
        assert_eq!(summary.total.as_deref(), Some("302000"));
        assert_eq!(
            summary.positivity.as_deref(),
            Some("Overwhelmingly Positive")
        );
    }

    #[test]
    fn review_summary_rejects_failure_and_garbage() {
        assert!(matches!(
            parse_review_summary(r#"{"success":2}"#),
            Err(FetchError::Decode { .. })
        ));
        assert!(matches!(
            parse_review_summary("<html>"),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn steamspy_tags_ranked_by_votes() {
        let body = r#"{"appid":620,"name":"Portal 2","tags":{"Puzzle":5000,"Co-op":4000,"Comedy":4000,"Sci-fi":100}}"#;
        assert_eq!(
            parse_steamspy_tags(body).unwrap(),
            vec!["Puzzle", "Co-op", "Comedy", "Sci-fi"]
        );
    }

    #[test]
    fn steamspy_empty_array_means_no_tags() {
        let body = r#"{"appid":12345,"name":null,"tags":[]}"#;
        assert!(parse_steamspy_tags(body).unwrap().is_empty());
        assert!(parse_steamspy_tags(r#"{"appid":1}"#).unwrap().is_empty());
    }

    #[test]
    fn steamspy_malformed_tags_are_rejected() {
        for body in [
            r#"{"tags":["Puzzle"]}"#,
            r#"{"tags":{"Puzzle":"many"}}"#,
            r#"{"tags":"Puzzle"}"#,
        ] {
            assert!(
                matches!(parse_steamspy_tags(body), Err(FetchError::Decode { .. })),
                "{body}"
            );
        }
    }

    fn reviews(total: &str, desc: &str) -> ReviewSummary {
        ReviewSummary {
            total: Some(total.to_string()),
            positivity: Some(desc.to_string()),
        }
    }

    #[test]
    fn metadata_survives_one_failed_half() {
        let date = Some("18 Apr, 2011".to_string());

        fn missing<T>() -> Result<T, FetchError> {
            Err(FetchError::NotFound(620))
        }

        let (d, r) = merge_metadata(620, Ok(date.clone()), missing()).unwrap();
        assert_eq!(d, date);
        assert_eq!(r, ReviewSummary::default());

        let (d, r) = merge_metadata(620, missing(), Ok(reviews("10", "Mixed"))).unwrap();
        assert_eq!(d, None);
        assert_eq!(r.total.as_deref(), Some("10"));

        assert!(matches!(
            merge_metadata(620, missing(), missing()),
            Err(FetchError::NotFound(620))
        ));
    }

    #[test]
    fn fetch_keeps_whichever_lookup_succeeded() {
        let entity = Entity::new(620, "Portal 2");
        let meta = || {
            let summary = reviews("302000", "Overwhelmingly Positive");
            Ok((Some("18 Apr, 2011".to_string()), summary))
        };
        let tags = || Ok(vec!["Puzzle".to_string(), "Co-op".to_string()]);

        let full = merge_fetch(&entity, meta(), tags()).unwrap();
        assert_eq!(full.release_date.as_deref(), Some("18 Apr, 2011"));
        assert_eq!(full.total_review_count.as_deref(), Some("302000"));
        assert_eq!(full.tags, vec!["Puzzle", "Co-op"]);
        assert!(full.scraped_on.is_none());

        let no_tags = merge_fetch(&entity, meta(), Err(FetchError::NotFound(620))).unwrap();
        assert!(no_tags.tags.is_empty());
        assert_eq!(
            no_tags.review_positivity.as_deref(),
            Some("Overwhelmingly Positive")
        );

        let no_meta = merge_fetch(&entity, Err(FetchError::NotFound(620)), tags()).unwrap();
        assert_eq!(no_meta.release_date, None);
        assert_eq!(no_meta.total_review_count, None);
        assert_eq!(no_meta.tags.len(), 2);

        let neither = merge_fetch(
            &entity,
            Err(FetchError::NotFound(620)),
            Err(FetchError::Timeout(std::time::Duration::from_secs(1))),
        );
        assert!(matches!(neither, Err(FetchError::Both { .. })));
    }
}
