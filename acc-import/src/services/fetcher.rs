use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::importer::ImportError;

/// Hard ceiling on a single remote image.
pub const MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Signed-URL origins photos may be fetched from.
const ALLOWED_HOST_SUFFIXES: [&str; 2] = ["amazonaws.com", "autodesk.com"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// `content-type` up to the first `;`, trimmed and lower-cased. May be empty.
    pub content_type: String,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImportError>;
}

pub struct HttpImageFetcher {
    http: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_max_bytes(MAX_IMAGE_BYTES)
    }

    /// Redirects are returned as-is: the allow-list only vouches for the
    /// first hop.
    pub fn with_max_bytes(max_bytes: usize) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http, max_bytes })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImportError> {
        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ImportError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::FetchStatus(status.as_u16()));
        }

        // Declared length is checked before any of the body is read
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                return Err(ImportError::TooLarge);
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(header_media_type)
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ImportError::Fetch(e.to_string()))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(ImportError::TooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Parse `raw` and accept it only for https on an allow-listed host.
pub fn allowed_remote_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    if url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let allowed = ALLOWED_HOST_SUFFIXES
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)));
    allowed.then_some(url)
}

fn header_media_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Guess from the path extension. Empty when unknown.
pub fn infer_content_type(url: &Url) -> &'static str {
    let path = url.path().to_ascii_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        ""
    }
}

/// Header type if present, otherwise inferred from the URL.
pub fn resolve_content_type(url: &Url, header_type: &str) -> String {
    if header_type.is_empty() {
        infer_content_type(url).to_string()
    } else {
        header_type.to_string()
    }
}

pub fn is_allowed_content_type(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_remote_url() {
        assert!(allowed_remote_url("https://bucket.s3.amazonaws.com/a.jpg").is_some());
        assert!(allowed_remote_url("https://CDN.Autodesk.com/photo").is_some());
        assert!(allowed_remote_url("https://autodesk.com/photo").is_some());

        assert!(allowed_remote_url("http://bucket.s3.amazonaws.com/a.jpg").is_none());
        assert!(allowed_remote_url("https://example.com/a.jpg").is_none());
        assert!(allowed_remote_url("https://evilautodesk.com/a.jpg").is_none());
        assert!(allowed_remote_url("https://autodesk.com.evil.net/a.jpg").is_none());
        assert!(allowed_remote_url("not a url").is_none());
        assert!(allowed_remote_url("").is_none());
    }

    #[test]
    fn test_header_media_type() {
        assert_eq!(header_media_type("Image/JPEG; charset=binary"), "image/jpeg");
        assert_eq!(header_media_type("  image/png "), "image/png");
        assert_eq!(header_media_type(""), "");
    }

    #[test]
    fn test_resolve_content_type_falls_back_to_extension() {
        let url = Url::parse("https://x.autodesk.com/p/IMG_01.JPEG?sig=abc").unwrap();
        assert_eq!(resolve_content_type(&url, ""), "image/jpeg");
        assert_eq!(resolve_content_type(&url, "image/png"), "image/png");

        let url = Url::parse("https://x.autodesk.com/p/file.webp").unwrap();
        assert_eq!(resolve_content_type(&url, ""), "image/webp");

        let url = Url::parse("https://x.autodesk.com/p/file.gif").unwrap();
        assert_eq!(resolve_content_type(&url, ""), "");
        assert!(!is_allowed_content_type(""));
        assert!(!is_allowed_content_type("image/gif"));
        assert!(is_allowed_content_type("image/webp"));
    }
}
