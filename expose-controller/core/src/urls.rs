//! String helpers for composing and decomposing exposed URLs.

use std::{borrow::Cow, net::Ipv6Addr};
use url::Url;

/// Joins path segments so that exactly one `/` separates each of them.
///
/// Leading slashes are kept on the first segment and trailing slashes on the
/// last one.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let last = parts.len().saturating_sub(1);
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        let mut p = part.as_ref();
        if i > 0 {
            out.push('/');
            p = p.strip_prefix('/').unwrap_or(p);
        }
        if i < last {
            p = p.strip_suffix('/').unwrap_or(p);
        }
        out.push_str(p);
    }
    out
}

/// Formats `host:port`, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: impl std::fmt::Display) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Brackets a bare IPv6 literal so that it can be used as a URL host.
pub fn url_host(host: &str) -> Cow<'_, str> {
    if host.parse::<Ipv6Addr>().is_ok() {
        Cow::Owned(format!("[{host}]"))
    } else {
        Cow::Borrowed(host)
    }
}

/// Returns the port component of a `host:port` or `[v6]:port` string, if
/// any. A bare IPv6 literal has no port.
pub(crate) fn split_port(host: &str) -> Option<&str> {
    let port = match host.strip_prefix('[') {
        Some(rest) => rest.split_once("]:")?.1,
        None => {
            let (name, port) = host.rsplit_once(':')?;
            if name.contains(':') {
                return None;
            }
            port
        }
    };
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(port)
}

/// Returns the scheme of `url`, e.g. `https`.
pub fn scheme(url: &str) -> Option<&str> {
    url.split_once("://")
        .map(|(scheme, _)| scheme)
        .filter(|s| !s.is_empty())
}

/// Strips an `http://` or `https://` prefix.
pub fn strip_http_scheme(url: &str) -> &str {
    url.strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url)
}

/// Returns the host of `url`, including an explicit port.
pub fn host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Returns the path of `url`, always starting with `/`.
pub fn path(url: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(url)?;
    let path = parsed.path();
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Ok(format!("/{path}"))
    }
}

/// Replaces the path of `url` with `/`.
pub fn root(url: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    parsed.set_path("/");
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_collapses_separators() {
        assert_eq!(join(&["/", "ns1", "web", "/"]), "/ns1/web/");
        assert_eq!(join(&["/", "ns1", "web", "docs"]), "/ns1/web/docs");
        assert_eq!(join(&["example.com", "/ns1/web/"]), "example.com/ns1/web/");
        assert_eq!(join(&["http://a/", "/b"]), "http://a/b");
        assert_eq!(join::<&str>(&[]), "");
    }

    #[test]
    fn host_port() {
        assert_eq!(join_host_port("10.0.0.5", 30080), "10.0.0.5:30080");
        assert_eq!(join_host_port("fd00::1", 30080), "[fd00::1]:30080");
        assert_eq!(split_port("10.0.0.5:8443"), Some("8443"));
        assert_eq!(split_port("example.com"), None);
        assert_eq!(split_port("[fd00::1]:443"), Some("443"));
        assert_eq!(split_port("[fd00::1]"), None);
        assert_eq!(split_port("2001:db8::443"), None);
        assert_eq!(url_host("2001:db8::443"), "[2001:db8::443]");
        assert_eq!(url_host("10.0.0.5"), "10.0.0.5");
        assert_eq!(url_host("[fd00::1]:443"), "[fd00::1]:443");
    }

    #[test]
    fn decompose() {
        assert_eq!(scheme("https://foo.example.com/bar/"), Some("https"));
        assert_eq!(scheme("foo.example.com"), None);
        assert_eq!(strip_http_scheme("http://foo/"), "foo/");
        assert_eq!(
            host("http://foo.example.com:8080/bar").as_deref(),
            Some("foo.example.com:8080")
        );
        assert_eq!(path("http://foo.example.com").unwrap(), "/");
        assert_eq!(path("http://foo.example.com/a/b/").unwrap(), "/a/b/");
        assert_eq!(
            root("https://foo.example.com/bar/").unwrap(),
            "https://foo.example.com/"
        );
    }
}
