//! Sitemap pipeline: full generation with a static fallback.
//!
//! `generate` never fails. Whatever goes wrong — no discoverer wired,
//! enumeration error, empty output — the pipeline synthesizes a minimal but
//! schema-valid document from the fixed top-level route list, so search
//! engines always receive well-formed XML with a 200.

use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

use crate::application::discovery::{DiscoveryError, RouteDiscoverer, canonical_url};
use crate::config::{Environment, SiteSettings};

const SOURCE: &str = "application::sitemap";
const DEFAULT_DEV_HOST: &str = "localhost:3000";

/// The site's top-level routes. Also the entire content of the fallback
/// document when discovery is unavailable.
pub const TOP_LEVEL_ROUTES: &[&str] = &[
    "/",
    "/about-us",
    "/contact-us",
    "/faqs",
    "/blogs",
    "/services",
    "/providers",
    "/become-provider",
    "/privacy-policy",
    "/terms-and-conditions",
];

/// Cache directive for the full document: regenerating is expensive and the
/// route set changes rarely.
pub const FULL_CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate=86400";
/// Cache directive for the fallback document: short, so a transient fault
/// self-heals quickly once it clears.
pub const FALLBACK_CACHE_CONTROL: &str = "public, s-maxage=600, stale-while-revalidate=3600";

/// Host-derived request data the pipeline needs for base-URL resolution.
#[derive(Debug, Clone, Default)]
pub struct RequestHost {
    pub host: Option<String>,
    pub forwarded_proto: Option<String>,
}

/// Which path produced the document. The HTTP response shape is identical
/// either way; the variant exists for diagnostics and tests.
#[derive(Debug)]
pub enum SitemapOutcome {
    Full(String),
    Fallback { xml: String, cause: String },
}

impl SitemapOutcome {
    pub fn xml(&self) -> &str {
        match self {
            SitemapOutcome::Full(xml) => xml,
            SitemapOutcome::Fallback { xml, .. } => xml,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SitemapOutcome::Fallback { .. })
    }

    pub fn cache_control(&self) -> &'static str {
        match self {
            SitemapOutcome::Full(_) => FULL_CACHE_CONTROL,
            SitemapOutcome::Fallback { .. } => FALLBACK_CACHE_CONTROL,
        }
    }
}

/// Service for generating sitemap.xml and robots.txt.
#[derive(Clone)]
pub struct SitemapService {
    environment: Environment,
    public_url: Option<String>,
    discoverer: Option<Arc<dyn RouteDiscoverer>>,
}

impl SitemapService {
    pub fn new(site: &SiteSettings, discoverer: Option<Arc<dyn RouteDiscoverer>>) -> Self {
        Self {
            environment: site.environment,
            public_url: site.public_url.as_ref().map(|url| url.to_string()),
            discoverer,
        }
    }

    /// Generate the sitemap document for one request. Infallible by design:
    /// every failure degrades to the fallback document.
    pub async fn generate(&self, request: &RequestHost) -> SitemapOutcome {
        let base_url = self.resolve_base_url(request);
        match self.try_full(&base_url).await {
            Ok(xml) => SitemapOutcome::Full(xml),
            Err(err) => {
                error!(
                    target_module = SOURCE,
                    error = %err,
                    base_url = %base_url,
                    "sitemap generation failed, serving fallback document"
                );
                SitemapOutcome::Fallback {
                    xml: build_fallback_sitemap(&base_url, OffsetDateTime::now_utc()),
                    cause: err.to_string(),
                }
            }
        }
    }

    /// Generate robots.txt content for one request.
    pub fn robots(&self, request: &RequestHost) -> String {
        let base = self.resolve_base_url(request);
        let sitemap_url = canonical_url(&base, "/sitemap.xml");
        format!("User-agent: *\nAllow: /\nSitemap: {sitemap_url}\n")
    }

    async fn try_full(&self, base_url: &str) -> Result<String, DiscoveryError> {
        let discoverer = self.discoverer.as_ref().ok_or(DiscoveryError::Unavailable)?;
        let xml = discoverer.discover(base_url).await?;
        if xml.trim().is_empty() {
            return Err(DiscoveryError::Source(
                "discoverer returned an empty document".to_string(),
            ));
        }
        Ok(xml)
    }

    /// Resolve the base URL per invocation: request headers in development,
    /// the configured public URL in production.
    fn resolve_base_url(&self, request: &RequestHost) -> String {
        if matches!(self.environment, Environment::Development) {
            let proto = request.forwarded_proto.as_deref().unwrap_or("http");
            let host = request.host.as_deref().unwrap_or(DEFAULT_DEV_HOST);
            return format!("{proto}://{host}");
        }
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{DEFAULT_DEV_HOST}"),
        }
    }
}

/// Render the fixed top-level route list as minimal, schema-valid entries.
pub fn build_fallback_sitemap(base_url: &str, generated_at: OffsetDateTime) -> String {
    let lastmod = generated_at.format(&Rfc3339).unwrap_or_default();
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\
         \x20 <!-- Fallback sitemap generated due to runtime error -->\n",
    );
    for route in TOP_LEVEL_ROUTES {
        let loc = canonical_url(base_url, route);
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{loc}</loc>\n"));
        xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
        xml.push_str("    <changefreq>weekly</changefreq>\n");
        xml.push_str("    <priority>0.7</priority>\n");
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::SiteSettings;

    struct StaticDiscoverer(&'static str);

    #[async_trait]
    impl RouteDiscoverer for StaticDiscoverer {
        async fn discover(&self, _base_url: &str) -> Result<String, DiscoveryError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingDiscoverer;

    #[async_trait]
    impl RouteDiscoverer for FailingDiscoverer {
        async fn discover(&self, _base_url: &str) -> Result<String, DiscoveryError> {
            Err(DiscoveryError::Source("backend unreachable".to_string()))
        }
    }

    fn development_site() -> SiteSettings {
        SiteSettings {
            environment: Environment::Development,
            ..SiteSettings::default()
        }
    }

    fn production_site(url: &str) -> SiteSettings {
        SiteSettings {
            environment: Environment::Production,
            public_url: Some(url.parse().expect("valid url")),
            ..SiteSettings::default()
        }
    }

    fn headers(host: &str, proto: Option<&str>) -> RequestHost {
        RequestHost {
            host: Some(host.to_string()),
            forwarded_proto: proto.map(str::to_string),
        }
    }

    #[test]
    fn development_base_url_comes_from_headers() {
        let service = SitemapService::new(&development_site(), None);
        let base = service.resolve_base_url(&headers("localhost:4000", Some("https")));
        assert_eq!(base, "https://localhost:4000");
    }

    #[test]
    fn development_base_url_defaults_without_headers() {
        let service = SitemapService::new(&development_site(), None);
        assert_eq!(
            service.resolve_base_url(&RequestHost::default()),
            "http://localhost:3000"
        );
    }

    #[test]
    fn production_base_url_ignores_headers() {
        let service = SitemapService::new(&production_site("https://example.com/"), None);
        let base = service.resolve_base_url(&headers("evil.example", Some("http")));
        assert_eq!(base, "https://example.com");
    }

    #[test]
    fn fallback_document_lists_every_top_level_route() {
        let generated_at = OffsetDateTime::UNIX_EPOCH;
        let xml = build_fallback_sitemap("https://example.com", generated_at);

        assert_eq!(xml.matches("<url>").count(), TOP_LEVEL_ROUTES.len());
        assert!(xml.contains("<loc>https://example.com</loc>"));
        assert!(xml.contains("<loc>https://example.com/about-us</loc>"));
        assert!(xml.contains("<loc>https://example.com/terms-and-conditions</loc>"));
        assert!(xml.contains("<lastmod>1970-01-01T00:00:00Z</lastmod>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<priority>0.7</priority>"));
    }

    #[tokio::test]
    async fn successful_discovery_yields_full_outcome() {
        let service = SitemapService::new(
            &production_site("https://example.com"),
            Some(Arc::new(StaticDiscoverer("<urlset></urlset>"))),
        );
        let outcome = service.generate(&RequestHost::default()).await;

        assert!(!outcome.is_fallback());
        assert_eq!(outcome.xml(), "<urlset></urlset>");
        assert_eq!(outcome.cache_control(), FULL_CACHE_CONTROL);
    }

    #[tokio::test]
    async fn missing_discoverer_yields_fallback() {
        let service = SitemapService::new(&production_site("https://example.com"), None);
        let outcome = service.generate(&RequestHost::default()).await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.cache_control(), FALLBACK_CACHE_CONTROL);
        assert!(outcome.xml().contains("<loc>https://example.com/faqs</loc>"));
    }

    #[tokio::test]
    async fn failing_discoverer_yields_fallback_with_cause() {
        let service = SitemapService::new(
            &production_site("https://example.com"),
            Some(Arc::new(FailingDiscoverer)),
        );
        let outcome = service.generate(&RequestHost::default()).await;

        match outcome {
            SitemapOutcome::Fallback { xml, cause } => {
                assert!(cause.contains("backend unreachable"));
                assert!(xml.contains("<loc>https://example.com/about-us</loc>"));
                assert!(xml.contains("<changefreq>weekly</changefreq>"));
                assert!(xml.contains("<priority>0.7</priority>"));
            }
            SitemapOutcome::Full(_) => panic!("expected fallback"),
        }
    }

    #[tokio::test]
    async fn empty_discovery_output_counts_as_failure() {
        let service = SitemapService::new(
            &production_site("https://example.com"),
            Some(Arc::new(StaticDiscoverer("  "))),
        );
        let outcome = service.generate(&RequestHost::default()).await;
        assert!(outcome.is_fallback());
    }

    #[test]
    fn robots_points_at_sitemap() {
        let service = SitemapService::new(&production_site("https://example.com"), None);
        let body = service.robots(&RequestHost::default());
        assert_eq!(
            body,
            "User-agent: *\nAllow: /\nSitemap: https://example.com/sitemap.xml\n"
        );
    }
}
