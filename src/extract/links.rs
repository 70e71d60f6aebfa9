//! Listing URL handling: normalization, item ids and alternate URL forms

use super::ExtractError;
use url::Url;

/// Query parameters that only carry tracking data
const TRACKING_PARAMS: &[&str] = &[
    "_trkparms",
    "_trksid",
    "amdata",
    "campid",
    "customid",
    "hash",
    "mkcid",
    "mkevt",
    "mkrid",
    "toolid",
];

/// Parse a user-supplied listing URL into its canonical form.
///
/// A missing scheme defaults to https. Fragments and tracking parameters are
/// dropped so the same listing always yields the same URL.
pub fn normalize_url(raw: &str) -> Result<Url, ExtractError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExtractError::InvalidUrl("empty URL".to_string()));
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let mut url =
        Url::parse(&with_scheme).map_err(|e| ExtractError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::InvalidUrl(format!(
            "{raw}: unsupported scheme {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ExtractError::InvalidUrl(format!("{raw}: missing host")));
    }

    url.set_fragment(None);
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let key: &str = k;
            !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key)
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(url)
}

/// Marketplace item number, from `/itm/<id>`, `/itm/<slug>/<id>` or an
/// `item`/`itemId` query parameter
pub fn item_id(url: &Url) -> Option<String> {
    if let Some(segments) = url.path_segments() {
        let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
        if let Some(pos) = segments.iter().position(|s| *s == "itm") {
            if let Some(id) = segments[pos + 1..].iter().take(2).find(|s| is_numeric_id(s)) {
                return Some(id.to_string());
            }
        }
    }

    url.query_pairs()
        .find(|(k, v)| (k == "item" || k == "itemId") && is_numeric_id(v))
        .map(|(_, v)| v.into_owned())
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Other URL forms for the same listing: the canonical desktop
/// `/itm/<id>` URL and the mobile host. The input itself is excluded.
pub fn alternate_urls(url: &Url) -> Vec<Url> {
    let Some(host) = url.host_str() else {
        return vec![];
    };
    let base_host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);

    let candidates: Vec<String> = match item_id(url) {
        Some(id) => vec![
            format!("https://www.{base_host}/itm/{id}"),
            format!("https://m.{base_host}/itm/{id}"),
        ],
        None => {
            let mut mobile = url.clone();
            if mobile.set_host(Some(&format!("m.{base_host}"))).is_err() {
                return vec![];
            }
            vec![mobile.to_string()]
        }
    };

    let mut out: Vec<Url> = Vec::new();
    for candidate in candidates {
        if let Ok(alt) = Url::parse(&candidate) {
            if alt != *url && !out.contains(&alt) {
                out.push(alt);
            }
        }
    }
    out
}
