//! Cross-origin policy for browser clients.

use std::str::FromStr;
use std::sync::Arc;

use axum::http::{request::Parts, HeaderValue};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::core::ConfigError;

/// One entry of the origin allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    /// `https://innervoice.vercel.app`
    Exact(String),
    /// `https://*.vercel.app`: any subdomain of `vercel.app` over `https`.
    Subdomain { scheme: String, domain: String },
}

impl FromStr for OriginPattern {
    type Err = ConfigError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Origin(pattern.to_string());

        let (scheme, host) = pattern.split_once("://").ok_or_else(invalid)?;
        if scheme.is_empty() || host.is_empty() || host.contains('/') {
            return Err(invalid());
        }

        match host.strip_prefix("*.") {
            Some(domain) if !domain.is_empty() && !domain.contains('*') => {
                Ok(Self::Subdomain {
                    scheme: scheme.to_ascii_lowercase(),
                    domain: domain.to_ascii_lowercase(),
                })
            }
            Some(_) => Err(invalid()),
            None if host.contains('*') => Err(invalid()),
            None => Ok(Self::Exact(pattern.to_ascii_lowercase())),
        }
    }
}

impl OriginPattern {
    pub fn matches(&self, origin: &str) -> bool {
        let origin = origin.to_ascii_lowercase();
        match self {
            Self::Exact(allowed) => origin == *allowed,
            Self::Subdomain { scheme, domain } => origin
                .strip_prefix(scheme.as_str())
                .and_then(|rest| rest.strip_prefix("://"))
                .and_then(|host| host.strip_suffix(domain.as_str()))
                .and_then(|subdomain| subdomain.strip_suffix('.'))
                .is_some_and(|subdomain| {
                    !subdomain.is_empty() && !subdomain.contains(['/', ':'])
                }),
        }
    }
}

/// Build the CORS layer for the configured allow-list.
///
/// Listed origins may use any method and header. Both are mirrored from the
/// preflight request because a literal `*` is rejected by browsers when
/// credentials are allowed.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, ConfigError> {
    let patterns = config
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<OriginPattern>())
        .collect::<Result<Vec<_>, _>>()?;
    let patterns = Arc::new(patterns);

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        origin
            .to_str()
            .map(|origin| patterns.iter().any(|pattern| pattern.matches(origin)))
            .unwrap_or(false)
    });

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(config.allow_credentials)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> OriginPattern {
        s.parse().unwrap()
    }

    #[test]
    fn exact_origins_match_only_themselves() {
        let local = pattern("http://localhost:5173");
        assert!(local.matches("http://localhost:5173"));
        assert!(!local.matches("http://localhost:3000"));
        assert!(!local.matches("https://localhost:5173"));
    }

    #[test]
    fn wildcard_matches_subdomains_only() {
        let vercel = pattern("https://*.vercel.app");
        assert!(vercel.matches("https://innervoice.vercel.app"));
        assert!(vercel.matches("https://preview-123.team.vercel.app"));
        assert!(!vercel.matches("https://vercel.app"));
        assert!(!vercel.matches("http://innervoice.vercel.app"));
        assert!(!vercel.matches("https://evilvercel.app"));
        assert!(!vercel.matches("https://innervoice.vercel.app.evil.com"));
    }

    #[test]
    fn rejects_malformed_patterns() {
        let malformed = [
            "localhost:5173",
            "https://",
            "https://*",
            "https://a.*.com",
            "https://x.com/path",
        ];
        for bad in malformed {
            assert!(bad.parse::<OriginPattern>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn default_allow_list_builds() {
        assert!(cors_layer(&CorsConfig::default()).is_ok());
    }
}
