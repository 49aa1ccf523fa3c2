//! Connection descriptors.

use url::Url;

const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Identifies which physical database a pool targets.
///
/// Two descriptors are equal iff their canonical connection strings match.
/// The raw string is what the driver receives; `Display` redacts secrets.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    raw: String,
    canonical: String,
}

impl ConnectionDescriptor {
    pub fn new(url: &str) -> Self {
        let raw = url.trim().to_string();
        let canonical = canonicalize(&raw).unwrap_or_else(|| raw.clone());
        Self { raw, canonical }
    }

    /// Connection string as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lower-cased URL scheme, if the string parses as a URL.
    pub fn scheme(&self) -> Option<String> {
        Url::parse(&self.raw).ok().map(|u| u.scheme().to_string())
    }

    /// Connection string safe for logs.
    pub fn redacted(&self) -> String {
        match Url::parse(&self.raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("****"));
                }
                url.to_string()
            }
            Err(_) => match self.raw.find('@') {
                Some(at) => format!("{}...", &self.raw[..at]),
                None => format!("{}...", self.raw.chars().take(10).collect::<String>()),
            },
        }
    }
}

fn canonicalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;

    if url.scheme() == "postgres" {
        url.set_scheme("postgresql").ok()?;
    }

    if let Some(host) = url.host_str() {
        let lower = host.to_ascii_lowercase();
        if lower != host {
            url.set_host(Some(&lower)).ok()?;
        }
    }

    if url.scheme() == "postgresql" && url.has_host() && url.port().is_none() {
        url.set_port(Some(DEFAULT_POSTGRES_PORT)).ok()?;
    }

    Some(url.to_string())
}

impl PartialEq for ConnectionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ConnectionDescriptor {}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}
