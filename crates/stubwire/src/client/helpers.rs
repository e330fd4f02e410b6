//! URL, origin, auth, and cookie helpers used when a call is prepared.

use super::config::ParamsSerializer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::Uri;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Matches `scheme://` and protocol-relative `//` prefixes.
static ABSOLUTE_URL_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_absolute_url_regex() -> &'static Regex {
    ABSOLUTE_URL_REGEX.get_or_init(|| Regex::new(r"(?i)^([a-z][a-z\d+\-.]*:)?//").unwrap())
}

/// Percent-encode a query component, keeping the characters that are
/// conventionally left readable in query strings.
pub fn encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%40", "@")
        .replace("%3A", ":")
        .replace("%24", "$")
        .replace("%2C", ",")
        .replace("%20", "+")
        .replace("%5B", "[")
        .replace("%5D", "]")
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Default params serialization.
///
/// Null values are skipped, arrays expand to repeated `key[]` pairs and
/// objects are JSON-encoded.
pub fn serialize_params(params: &[(String, Value)]) -> String {
    let mut parts = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => continue,
            Value::Array(items) => {
                let key = encode(&format!("{key}[]"));
                for item in items.iter().filter(|item| !item.is_null()) {
                    parts.push(format!("{key}={}", encode(&stringify(item))));
                }
            }
            other => parts.push(format!("{}={}", encode(key), encode(&stringify(other)))),
        }
    }
    parts.join("&")
}

/// Append serialized params to a URL, dropping any `#fragment`.
pub fn build_url(
    url: &str,
    params: &[(String, Value)],
    serializer: Option<&ParamsSerializer>,
) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let serialized = match serializer {
        Some(serialize) => serialize(params),
        None => serialize_params(params),
    };
    if serialized.is_empty() {
        return url.to_string();
    }

    let base = match url.find('#') {
        Some(index) => &url[..index],
        None => url,
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{serialized}")
}

pub fn is_absolute_url(url: &str) -> bool {
    get_absolute_url_regex().is_match(url)
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn combine_urls(base_url: &str, relative_url: &str) -> String {
    if relative_url.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        relative_url.trim_start_matches('/')
    )
}

fn origin_of(url: &str) -> Option<(String, String, u16)> {
    let uri: Uri = url.parse().ok()?;
    let scheme = uri.scheme_str()?.to_ascii_lowercase();
    let host = uri.host()?.to_ascii_lowercase();
    let port = uri.port_u16().unwrap_or(match scheme.as_str() {
        "https" | "wss" => 443,
        _ => 80,
    });
    Some((scheme, host, port))
}

/// Whether `url` targets the same origin as `origin`.
///
/// Relative URLs always resolve against the origin. Without an origin (no
/// page context) every URL counts as same-origin.
pub fn is_url_same_origin(url: &str, origin: Option<&str>) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    if !is_absolute_url(url) {
        return true;
    }

    let Some(page) = origin_of(origin) else {
        return false;
    };
    let target = if url.starts_with("//") {
        origin_of(&format!("{}:{url}", page.0))
    } else {
        origin_of(url)
    };
    target.as_ref() == Some(&page)
}

/// `Authorization` header value for basic auth.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Cookie store the client reads XSRF tokens from.
///
/// Values are stored percent-encoded, the way a cookie header carries them,
/// and decoded on read.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<(String, String)>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar from a `name=value; other=value` cookie string.
    pub fn parse(cookie_header: &str) -> Self {
        let cookies = cookie_header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.to_string()))
            })
            .collect();
        Self {
            cookies: RwLock::new(cookies),
        }
    }

    pub fn write(&self, name: impl Into<String>, value: &str) {
        let name = name.into();
        let encoded = urlencoding::encode(value).into_owned();
        let mut cookies = self.cookies.write();
        match cookies.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = encoded,
            None => cookies.push((name, encoded)),
        }
    }

    pub fn read(&self, name: &str) -> Option<String> {
        let cookies = self.cookies.read();
        let (_, raw) = cookies.iter().find(|(existing, _)| existing == name)?;
        Some(
            urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.clone()),
        )
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut cookies = self.cookies.write();
        let before = cookies.len();
        cookies.retain(|(existing, _)| existing != name);
        cookies.len() != before
    }

    /// Render the jar back into a cookie header string.
    pub fn to_header(&self) -> String {
        self.cookies
            .read()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn params(pairs: Vec<(&str, Value)>) -> Vec<(String, Value)> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_build_url_without_params() {
        assert_eq!(build_url("/users/1", &[], None), "/users/1");
    }

    #[test]
    fn test_build_url_serializes_params() {
        let p = params(vec![("page", json!(2)), ("q", json!("fred flintstone"))]);
        assert_eq!(build_url("/users", &p, None), "/users?page=2&q=fred+flintstone");
    }

    #[test]
    fn test_build_url_appends_to_existing_query_and_drops_hash() {
        let p = params(vec![("b", json!(true))]);
        assert_eq!(build_url("/users?a=1#top", &p, None), "/users?a=1&b=true");
    }

    #[test]
    fn test_serialize_params_arrays_objects_and_nulls() {
        let p = params(vec![
            ("ids", json!([1, 2])),
            ("skip", Value::Null),
            ("filter", json!({"name": "x"})),
            ("at", json!("user@host:8080")),
        ]);
        assert_eq!(
            serialize_params(&p),
            "ids[]=1&ids[]=2&filter=%7B%22name%22:%22x%22%7D&at=user@host:8080"
        );
    }

    #[test]
    fn test_build_url_custom_serializer() {
        let serializer: ParamsSerializer = Arc::new(|p: &[(String, Value)]| {
            p.iter()
                .map(|(k, _)| k.clone())
                .collect::<Vec<_>>()
                .join(",")
        });
        let p = params(vec![("a", json!(1)), ("b", json!(2))]);
        assert_eq!(build_url("/x", &p, Some(&serializer)), "/x?a,b");
    }

    #[test]
    fn test_absolute_and_combine() {
        assert!(is_absolute_url("https://example.com/a"));
        assert!(is_absolute_url("//cdn.example.com/a"));
        assert!(!is_absolute_url("/users"));
        assert_eq!(
            combine_urls("https://api.example.com/", "/users/1"),
            "https://api.example.com/users/1"
        );
        assert_eq!(combine_urls("https://api.example.com", ""), "https://api.example.com");
    }

    #[test]
    fn test_same_origin() {
        let origin = Some("https://app.example.com");
        assert!(is_url_same_origin("/users", origin));
        assert!(is_url_same_origin("https://app.example.com:443/users", origin));
        assert!(is_url_same_origin("//app.example.com/users", origin));
        assert!(!is_url_same_origin("https://other.example.com/users", origin));
        assert!(!is_url_same_origin("http://app.example.com/users", origin));
        assert!(is_url_same_origin("https://other.example.com", None));
    }

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth_header("janedoe", "s00pers3cret"), "Basic amFuZWRvZTpzMDBwZXJzM2NyZXQ=");
    }

    #[test]
    fn test_cookie_jar() {
        let jar = CookieJar::parse("XSRF-TOKEN=abc%20123; theme=dark");
        assert_eq!(jar.read("XSRF-TOKEN").as_deref(), Some("abc 123"));
        assert_eq!(jar.read("theme").as_deref(), Some("dark"));
        assert_eq!(jar.read("missing"), None);

        jar.write("theme", "light mode");
        assert_eq!(jar.read("theme").as_deref(), Some("light mode"));
        assert!(jar.remove("theme"));
        assert!(!jar.remove("theme"));
        assert_eq!(jar.to_header(), "XSRF-TOKEN=abc%20123");
    }
}
