use async_trait::async_trait;

use crate::application::ports::{MediaError, MediaResolver, ResolvedMedia};

/// Plain-HTTP resolver: a URL that already serves audio/video resolves to
/// itself; an HTML page is scanned for media tags and OpenGraph hints.
pub struct HttpMediaResolver {
    client: reqwest::Client,
}

impl HttpMediaResolver {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMediaResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaResolver for HttpMediaResolver {
    async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia, MediaError> {
        let response = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|e| MediaError::FetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MediaError::FetchFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if let Some(content_type) = &content_type {
            if content_type.starts_with("audio/") || content_type.starts_with("video/") {
                return Ok(ResolvedMedia {
                    download_url: source_url.to_string(),
                    title: None,
                    content_type: Some(content_type.clone()),
                });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| MediaError::FetchFailed(e.to_string()))?;

        let title = extract_between(&body, "<title>", "</title>").map(|t| t.trim().to_string());
        let media_url = extract_meta_content(&body, "og:video")
            .or_else(|| extract_meta_content(&body, "og:audio"))
            .or_else(|| extract_source_tag(&body));

        match media_url {
            Some(url) => Ok(ResolvedMedia {
                download_url: absolutize(source_url, &url),
                title,
                content_type: None,
            }),
            None => Err(MediaError::NoMediaFound(source_url.to_string())),
        }
    }
}

fn extract_between<'a>(haystack: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = haystack.find(open)? + open.len();
    let end = haystack[start..].find(close)? + start;
    Some(&haystack[start..end])
}

/// `<meta property="og:video" content="…">`, attribute order tolerant.
fn extract_meta_content(html: &str, property: &str) -> Option<String> {
    let needle = format!("\"{}\"", property);
    let at = html.find(&needle)?;
    let tag_start = html[..at].rfind('<')?;
    let tag_end = html[at..].find('>')? + at;
    let tag = &html[tag_start..tag_end];
    let content = extract_between(tag, "content=\"", "\"")?;
    Some(content.to_string())
}

/// First `<source src="…">` or `<audio src="…">` / `<video src="…">`.
fn extract_source_tag(html: &str) -> Option<String> {
    for tag_name in ["<source", "<audio", "<video"] {
        let mut rest = html;
        while let Some(at) = rest.find(tag_name) {
            let tag_end = match rest[at..].find('>') {
                Some(end) => at + end,
                None => break,
            };
            let tag = &rest[at..tag_end];
            if let Some(src) = extract_between(tag, "src=\"", "\"") {
                return Some(src.to_string());
            }
            rest = &rest[tag_end..];
        }
    }
    None
}

fn absolutize(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix("//") {
        let scheme = base.split("://").next().unwrap_or("https");
        return format!("{}://{}", scheme, rest);
    }
    let origin = base
        .split('/')
        .take(3)
        .collect::<Vec<&str>>()
        .join("/");
    format!("{}/{}", origin.trim_end_matches('/'), url.trim_start_matches('/'))
}
