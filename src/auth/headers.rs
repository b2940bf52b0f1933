use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER, USER_AGENT};
use log::warn;

// NSE rejects requests that don't look like they come from a desktop Chrome
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
pub const SEC_CH_UA: &str = "\"Not A(Brand\";v=\"99\", \"Google Chrome\";v=\"121\", \"Chromium\";v=\"121\"";
pub const AJAX_ACCEPT: &str = "application/json, text/plain, */*";
pub const DOCUMENT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

fn insert_static(headers: &mut HeaderMap, name: &'static str, value: &'static str) {
    headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
}

fn insert_referer(headers: &mut HeaderMap, referer: &str) {
    match HeaderValue::from_str(referer) {
        Ok(value) => {
            headers.insert(REFERER, value);
        }
        Err(e) => warn!("Skipping invalid Referer {}: {}", referer, e),
    }
}

/// Headers for the top-level page navigation that hands out the session cookies.
pub fn landing_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(DOCUMENT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    insert_static(&mut headers, "sec-ch-ua", SEC_CH_UA);
    insert_static(&mut headers, "sec-ch-ua-mobile", "?0");
    insert_static(&mut headers, "sec-ch-ua-platform", "\"Windows\"");
    insert_static(&mut headers, "sec-fetch-dest", "document");
    insert_static(&mut headers, "sec-fetch-mode", "navigate");
    insert_static(&mut headers, "sec-fetch-site", "cross-site");
    insert_static(&mut headers, "sec-fetch-user", "?1");
    insert_static(&mut headers, "upgrade-insecure-requests", "1");
    headers
}

/// Headers for an in-page XHR, as the NSE frontend issues them.
pub fn ajax_headers(referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(AJAX_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    insert_static(&mut headers, "x-requested-with", "XMLHttpRequest");
    insert_static(&mut headers, "sec-ch-ua", SEC_CH_UA);
    insert_static(&mut headers, "sec-ch-ua-mobile", "?0");
    insert_static(&mut headers, "sec-ch-ua-platform", "\"Windows\"");
    insert_static(&mut headers, "sec-fetch-dest", "empty");
    insert_static(&mut headers, "sec-fetch-mode", "cors");
    insert_static(&mut headers, "sec-fetch-site", "same-origin");
    insert_referer(&mut headers, referer);
    headers
}

/// Collapse raw `Set-Cookie` values into a single `Cookie` header value.
///
/// Only the `name=value` pair before the first `;` of each cookie is kept;
/// attributes like `Path` or `Expires` are dropped.
pub fn cookie_header(cookies: &[String]) -> Option<String> {
    let pairs: Vec<&str> = cookies
        .iter()
        .map(|cookie| cookie.split(';').next().unwrap_or_default().trim())
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_keeps_name_value_pairs() {
        let cookies = vec![
            "nsit=abc123; Path=/; HttpOnly; Secure".to_string(),
            "nseappid=xyz; Path=/; Max-Age=3600".to_string(),
            "bm_sv=plain".to_string(),
        ];
        assert_eq!(
            cookie_header(&cookies).as_deref(),
            Some("nsit=abc123; nseappid=xyz; bm_sv=plain")
        );
    }

    #[test]
    fn test_cookie_header_empty_jar() {
        assert_eq!(cookie_header(&[]), None);
        assert_eq!(cookie_header(&[";Path=/".to_string()]), None);
    }

    #[test]
    fn test_ajax_headers_mimic_xhr() {
        let headers = ajax_headers("https://www.nseindia.com/market-data/live-equity-market");
        assert_eq!(headers.get(ACCEPT).unwrap(), AJAX_ACCEPT);
        assert_eq!(headers.get("x-requested-with").unwrap(), "XMLHttpRequest");
        assert_eq!(
            headers.get(REFERER).unwrap(),
            "https://www.nseindia.com/market-data/live-equity-market"
        );
        assert_eq!(headers.get(USER_AGENT).unwrap(), BROWSER_USER_AGENT);
    }

    #[test]
    fn test_landing_headers_look_like_navigation() {
        let headers = landing_headers();
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
        assert!(headers.get("x-requested-with").is_none());
    }
}
