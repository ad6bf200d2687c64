//! Room service endpoint resolution.
//!
//! The client is normally served from the same origin as the room service, so
//! the endpoint is derived from the page location (`http` becomes `ws`,
//! `https` becomes `wss`). When the page is served from a local development
//! host, or no page location is known, a fixed remote endpoint is used.

use std::fmt;

/// Remote endpoint used when the page location can't be used.
pub const DEFAULT_FALLBACK_ENDPOINT: &str = "wss://pi6tw3.colyseus.de";

/// Host name treated as a local development host.
pub const LOCAL_DEV_HOST: &str = "localhost";

/// Endpoint parse/derive errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    MissingScheme(String),
    UnsupportedScheme(String),
    MissingHost(String),
    InvalidPort(String),
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::MissingScheme(url) => write!(f, "missing scheme in '{url}'"),
            EndpointError::UnsupportedScheme(s) => write!(f, "unsupported scheme '{s}'"),
            EndpointError::MissingHost(url) => write!(f, "missing host in '{url}'"),
            EndpointError::InvalidPort(p) => write!(f, "invalid port '{p}'"),
        }
    }
}

impl std::error::Error for EndpointError {}

/// Real-time connection scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Ws => 80,
            Scheme::Wss => 443,
        }
    }

    /// Maps a page protocol onto the matching real-time scheme.
    fn from_page_protocol(protocol: &str) -> Result<Self, EndpointError> {
        match protocol {
            "http" | "ws" => Ok(Scheme::Ws),
            "https" | "wss" => Ok(Scheme::Wss),
            other => Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Room service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parses a `ws://host[:port][/path]` or `wss://...` URL. Any path is ignored.
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let parts = split_url(url)?;
        let scheme = match parts.scheme {
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };
        Ok(Self {
            scheme,
            host: parts.host.to_string(),
            port: parts.port.unwrap_or_else(|| scheme.default_port()),
        })
    }

    /// The same endpoint with an `http(s)` scheme, for plain requests.
    pub fn http_url(&self) -> String {
        let scheme = match self.scheme {
            Scheme::Ws => "http",
            Scheme::Wss => "https",
        };
        format!("{}://{}:{}", scheme, self.host_for_url(), self.port)
    }

    /// `host:port` suitable for a socket connect.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.host_for_url(), self.port)
    }

    fn host_for_url(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host_for_url(), self.port)
    }
}

/// Location of the page the client was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// Protocol without the trailing colon, e.g. `https`.
    pub protocol: String,
    pub hostname: String,
    pub port: Option<u16>,
    /// Fragment without the leading `#`.
    pub hash: Option<String>,
}

impl PageLocation {
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let parts = split_url(url)?;
        Ok(Self {
            protocol: parts.scheme.to_string(),
            hostname: parts.host.to_string(),
            port: parts.port,
            hash: parts.hash.filter(|h| !h.is_empty()).map(str::to_string),
        })
    }

    pub fn is_local_dev_host(&self) -> bool {
        self.hostname == LOCAL_DEV_HOST
            || self.hostname.ends_with(&format!(".{LOCAL_DEV_HOST}"))
    }
}

/// Picks the room service endpoint for a page location.
pub fn derive_endpoint(
    page: Option<&PageLocation>,
    fallback: &str,
) -> Result<Endpoint, EndpointError> {
    match page {
        Some(page) if !page.is_local_dev_host() => {
            let scheme = Scheme::from_page_protocol(&page.protocol)?;
            Ok(Endpoint {
                scheme,
                host: page.hostname.clone(),
                port: page.port.unwrap_or_else(|| scheme.default_port()),
            })
        }
        _ => Endpoint::parse(fallback),
    }
}

struct UrlParts<'a> {
    scheme: &'a str,
    host: &'a str,
    port: Option<u16>,
    hash: Option<&'a str>,
}

fn split_url(url: &str) -> Result<UrlParts<'_>, EndpointError> {
    let url = url.trim();
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| EndpointError::MissingScheme(url.to_string()))?;

    let (rest, hash) = match rest.split_once('#') {
        Some((r, h)) => (r, Some(h)),
        None => (rest, None),
    };
    let authority = rest.split(['/', '?']).next().unwrap_or("");

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| EndpointError::MissingHost(url.to_string()))?;
        (host, after.strip_prefix(':'))
    } else {
        match authority.rsplit_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(EndpointError::MissingHost(url.to_string()));
    }

    let port = match port {
        None | Some("") => None,
        Some(p) => Some(
            p.parse::<u16>()
                .map_err(|_| EndpointError::InvalidPort(p.to_string()))?,
        ),
    };

    Ok(UrlParts {
        scheme,
        host,
        port,
        hash,
    })
}
