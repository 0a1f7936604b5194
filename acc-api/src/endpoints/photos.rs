use crate::{AccApiError, Client};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use tower_api_client::{Method, Request, RequestData};

pub const DEFAULT_LIMIT: u32 = 25;
pub const MAX_LIMIT: u32 = 50;
/// Upper bound on followed `nextPost` hops, the first request included.
pub const MAX_PAGES: usize = 10;

const THUMBNAIL_KEYS: &[&str] = &["thumbnailUrl", "thumbnail_url", "thumbnail"];
const FILE_KEYS: &[&str] = &["fileUrl", "file_url", "original", "full"];

// Common

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub file_url: String,
    pub taken_at: String,
}

impl Photo {
    /// Normalize one upstream result. Missing or mistyped fields become empty strings.
    pub fn from_raw(raw: &Value) -> Self {
        let empty = Map::new();
        let photo = raw.as_object().unwrap_or(&empty);
        let signed_urls = non_null(photo, "signedUrls")
            .or_else(|| non_null(photo, "signed_urls"))
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        Self {
            id: pick_string(photo, &["id"]),
            title: pick_string(photo, &["title", "name"]),
            description: pick_string(photo, &["description"]),
            thumbnail_url: pick_string(signed_urls, THUMBNAIL_KEYS),
            file_url: pick_string(signed_urls, FILE_KEYS),
            taken_at: pick_string(photo, &["takenAt", "taken_at", "createdAt"]),
        }
    }
}

fn non_null<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    record.get(key).filter(|v| !v.is_null())
}

fn pick_string(record: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct FilterPhotos {
    #[serde(skip)]
    project_id: String,
    filter: Map<String, Value>,
    include: Vec<String>,
    limit: u32,
    sort: Vec<String>,
}

impl FilterPhotos {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            filter: Map::new(),
            include: vec!["signedUrls".to_string()],
            limit: DEFAULT_LIMIT,
            sort: vec!["createdAt".to_string(), "desc".to_string()],
        }
    }

    /// Page size. Values outside `1..=MAX_LIMIT` fall back to the default.
    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = match limit {
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
            _ => DEFAULT_LIMIT,
        };
        self
    }

    pub fn page_size(&self) -> u32 {
        self.limit
    }
}

impl Request for FilterPhotos {
    type Data = Self;
    type Response = Value;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/construction/photos/v1/projects/{}/photos:filter",
            urlencoding::encode(&self.project_id)
        )
        .into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

/// The follow-up request described by the server, taken verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct NextRequest {
    pub url: String,
    pub body: Value,
}

#[derive(Debug, Clone, Default)]
pub struct PhotoPage {
    pub results: Vec<Value>,
    pub next: Option<NextRequest>,
}

impl PhotoPage {
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut page) = value else {
            return Self::default();
        };

        let results = match page.remove("results").filter(Value::is_array) {
            Some(Value::Array(results)) => results,
            _ => match page.remove("data") {
                Some(Value::Array(data)) => data,
                _ => Vec::new(),
            },
        };

        let next = page
            .remove("pagination")
            .and_then(|mut p| p.get_mut("nextPost").map(Value::take))
            .and_then(|mut post| {
                let url = post.get("url").and_then(Value::as_str)?.to_string();
                let body = post.get_mut("body").map(Value::take)?;
                (!body.is_null()).then_some(NextRequest { url, body })
            });

        Self { results, next }
    }
}

impl Client {
    /// Fetch photos for a project, following `pagination.nextPost` until the
    /// server stops handing one out or `MAX_PAGES` requests have been made.
    pub async fn photos(&self, request: FilterPhotos) -> Result<Vec<Photo>, AccApiError> {
        let mut page = PhotoPage::from_value(self.send(request).await?);
        let mut raw = Vec::new();
        let mut pages = 1;

        loop {
            raw.extend(page.results);

            let Some(next) = page.next else {
                break;
            };
            if pages >= MAX_PAGES {
                tracing::debug!(pages, "Photo pagination cap reached, truncating");
                break;
            }

            pages += 1;
            page = PhotoPage::from_value(self.post_absolute(&next.url, &next.body).await?);
        }

        tracing::debug!(pages, results = raw.len(), "Fetched photo pages");
        Ok(raw.iter().map(Photo::from_raw).collect())
    }
}
