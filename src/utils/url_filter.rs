//! Allow-list check for URLs entering the processed index.

use url::Url;

/// One allow-list entry: a host and an optional path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AllowedPrefix {
    host: String,
    path: Option<String>,
}

impl AllowedPrefix {
    fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        let entry = entry
            .strip_prefix("https://")
            .or_else(|| entry.strip_prefix("http://"))
            .unwrap_or(entry);
        let (host, path) = match entry.find('/') {
            Some(idx) => (&entry[..idx], Some(&entry[idx..])),
            None => (entry, None),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_ascii_lowercase(),
            path: path.filter(|p| *p != "/").map(str::to_string),
        })
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host_ok = host == self.host
            || host
                .strip_suffix(self.host.as_str())
                .is_some_and(|rest| rest.ends_with('.'));
        host_ok
            && self
                .path
                .as_deref()
                .map_or(true, |prefix| url.path().starts_with(prefix))
    }
}

/// Decides whether a URL may be recorded.
///
/// Entries look like `example.com` or `www.scribd.com/document/`. A host entry
/// also admits its subdomains. With no entries, any http(s) URL with a host
/// is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    allowed: Vec<AllowedPrefix>,
}

impl DomainFilter {
    /// Accept every http(s) URL.
    pub fn any() -> Self {
        Self::default()
    }

    /// Build a filter from allow-list entries. Blank entries are ignored.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: entries
                .into_iter()
                .filter_map(|e| AllowedPrefix::parse(e.as_ref()))
                .collect(),
        }
    }

    pub fn is_restricted(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// Check a URL, returning the reason it was rejected.
    pub fn check(&self, raw: &str) -> Result<(), String> {
        let url = Url::parse(raw).map_err(|e| format!("not a valid URL ({})", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported scheme '{}'", url.scheme()));
        }
        if url.host_str().is_none() {
            return Err("URL has no host".to_string());
        }
        if self.is_restricted() && !self.allowed.iter().any(|a| a.matches(&url)) {
            return Err("URL is outside the allowed domains".to_string());
        }
        Ok(())
    }

    pub fn accepts(&self, raw: &str) -> bool {
        self.check(raw).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_accepts_any_web_url() {
        let filter = DomainFilter::any();
        assert!(filter.accepts("https://example.org/a"));
        assert!(filter.accepts("http://example.org"));
        assert!(!filter.accepts("ftp://example.org/a"));
        assert!(!filter.accepts("HealthDentalhttps://example.org/a"));
        assert!(!filter.accepts("not a url"));
    }

    #[test]
    fn path_prefix_entries() {
        let filter = DomainFilter::new(["www.scribd.com/document/"]);
        assert!(filter.accepts("https://www.scribd.com/document/123/plan"));
        assert!(!filter.accepts("https://www.scribd.com/search?q=x"));
        assert!(!filter.accepts("https://example.com/document/1"));
    }

    #[test]
    fn host_entries_admit_subdomains() {
        let filter = DomainFilter::new(["example.com", ""]);
        assert!(filter.accepts("https://example.com/x"));
        assert!(filter.accepts("https://docs.example.com/x"));
        assert!(!filter.accepts("https://badexample.com/x"));
        assert!(filter.is_restricted());
    }
}
