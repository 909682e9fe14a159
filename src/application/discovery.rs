//! Route discovery for full sitemap generation.
//!
//! The discoverer is the capability the sitemap pipeline leans on for its
//! success path. It is selected exactly once at startup; absence (feature
//! flag off, or no implementation wired) is a first-class state the pipeline
//! degrades from, not a load error.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::sitemap::TOP_LEVEL_ROUTES;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("route discoverer is not configured")]
    Unavailable,
    #[error("route enumeration failed: {0}")]
    Source(String),
}

/// Sitemap change frequency hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
        }
    }
}

/// A route enumerated for the full sitemap.
#[derive(Debug, Clone)]
pub struct DiscoveredRoute {
    pub path: String,
    pub lastmod: Option<OffsetDateTime>,
    pub changefreq: ChangeFreq,
    pub priority: f32,
}

/// The external discovery capability: enumerate routes and render the full
/// sitemap XML, or fail.
#[async_trait]
pub trait RouteDiscoverer: Send + Sync {
    async fn discover(&self, base_url: &str) -> Result<String, DiscoveryError>;
}

/// Supplies dynamic (content-derived) routes to [`SiteRouteDiscoverer`].
#[async_trait]
pub trait RouteSource: Send + Sync {
    async fn dynamic_routes(&self) -> Result<Vec<DiscoveredRoute>, DiscoveryError>;
}

/// Default discoverer: fixed top-level routes plus dynamic routes from a
/// [`RouteSource`], rendered with hreflang alternates per configured language.
pub struct SiteRouteDiscoverer {
    source: Arc<dyn RouteSource>,
    languages: Vec<String>,
}

impl SiteRouteDiscoverer {
    pub fn new(source: Arc<dyn RouteSource>, languages: Vec<String>) -> Self {
        Self { source, languages }
    }
}

#[async_trait]
impl RouteDiscoverer for SiteRouteDiscoverer {
    async fn discover(&self, base_url: &str) -> Result<String, DiscoveryError> {
        let generated_at = OffsetDateTime::now_utc();
        let mut routes: Vec<DiscoveredRoute> = TOP_LEVEL_ROUTES
            .iter()
            .map(|path| DiscoveredRoute {
                path: (*path).to_string(),
                lastmod: Some(generated_at),
                changefreq: if *path == "/" {
                    ChangeFreq::Daily
                } else {
                    ChangeFreq::Weekly
                },
                priority: if *path == "/" { 1.0 } else { 0.8 },
            })
            .collect();
        routes.extend(self.source.dynamic_routes().await?);

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" \
             xmlns:xhtml=\"http://www.w3.org/1999/xhtml\">\n",
        );
        for route in &routes {
            xml.push_str(&route_entry(base_url, route, &self.languages));
        }
        xml.push_str("</urlset>\n");
        Ok(xml)
    }
}

fn route_entry(base: &str, route: &DiscoveredRoute, languages: &[String]) -> String {
    let loc = canonical_url(base, &route.path);
    let mut entry = String::from("  <url>\n");
    entry.push_str(&format!("    <loc>{loc}</loc>\n"));
    if let Some(lastmod) = route.lastmod.and_then(|dt| dt.format(&Rfc3339).ok()) {
        entry.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
    }
    entry.push_str(&format!(
        "    <changefreq>{}</changefreq>\n",
        route.changefreq.as_str()
    ));
    entry.push_str(&format!("    <priority>{:.1}</priority>\n", route.priority));
    if languages.len() > 1 {
        for language in languages {
            entry.push_str(&format!(
                "    <xhtml:link rel=\"alternate\" hreflang=\"{language}\" href=\"{loc}?lang={language}\"/>\n",
            ));
        }
        entry.push_str(&format!(
            "    <xhtml:link rel=\"alternate\" hreflang=\"x-default\" href=\"{loc}\"/>\n",
        ));
    }
    entry.push_str("  </url>\n");
    entry
}

pub(crate) fn canonical_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path == "/" {
        base.to_string()
    } else {
        format!("{base}{path}")
    }
}

/// Select the discovery capability once at startup.
///
/// Returns `None` when the SEO feature flag is off or no route source is
/// available; the caller treats that as "serve the fallback document".
pub fn select_discoverer(
    enable_seo: bool,
    languages: &[String],
    source: Option<Arc<dyn RouteSource>>,
) -> Option<Arc<dyn RouteDiscoverer>> {
    if !enable_seo {
        return None;
    }
    source.map(|source| {
        Arc::new(SiteRouteDiscoverer::new(source, languages.to_vec()))
            as Arc<dyn RouteDiscoverer>
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptySource;

    #[async_trait]
    impl RouteSource for EmptySource {
        async fn dynamic_routes(&self) -> Result<Vec<DiscoveredRoute>, DiscoveryError> {
            Ok(Vec::new())
        }
    }

    struct OneRoute;

    #[async_trait]
    impl RouteSource for OneRoute {
        async fn dynamic_routes(&self) -> Result<Vec<DiscoveredRoute>, DiscoveryError> {
            Ok(vec![DiscoveredRoute {
                path: "/services/plumbing".to_string(),
                lastmod: None,
                changefreq: ChangeFreq::Monthly,
                priority: 0.6,
            }])
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl RouteSource for BrokenSource {
        async fn dynamic_routes(&self) -> Result<Vec<DiscoveredRoute>, DiscoveryError> {
            Err(DiscoveryError::Source("directory unreadable".to_string()))
        }
    }

    #[tokio::test]
    async fn renders_top_level_and_dynamic_routes() {
        let discoverer =
            SiteRouteDiscoverer::new(Arc::new(OneRoute), vec!["en".to_string()]);
        let xml = discoverer
            .discover("https://example.com")
            .await
            .expect("discovery succeeds");

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<loc>https://example.com</loc>"));
        assert!(xml.contains("<loc>https://example.com/providers</loc>"));
        assert!(xml.contains("<loc>https://example.com/services/plumbing</loc>"));
        assert!(xml.contains("<changefreq>monthly</changefreq>"));
        assert!(xml.contains("<priority>0.6</priority>"));
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[tokio::test]
    async fn multi_language_sites_get_hreflang_alternates() {
        let discoverer = SiteRouteDiscoverer::new(
            Arc::new(EmptySource),
            vec!["en".to_string(), "ar".to_string()],
        );
        let xml = discoverer
            .discover("https://example.com")
            .await
            .expect("discovery succeeds");

        assert!(xml.contains(
            "hreflang=\"ar\" href=\"https://example.com/about-us?lang=ar\""
        ));
        assert!(xml.contains("hreflang=\"x-default\""));
    }

    #[tokio::test]
    async fn single_language_sites_skip_alternates() {
        let discoverer =
            SiteRouteDiscoverer::new(Arc::new(EmptySource), vec!["en".to_string()]);
        let xml = discoverer
            .discover("https://example.com")
            .await
            .expect("discovery succeeds");
        assert!(!xml.contains("xhtml:link rel"));
    }

    #[tokio::test]
    async fn source_failure_propagates() {
        let discoverer =
            SiteRouteDiscoverer::new(Arc::new(BrokenSource), vec!["en".to_string()]);
        let err = discoverer
            .discover("https://example.com")
            .await
            .expect_err("source failure surfaces");
        assert!(matches!(err, DiscoveryError::Source(_)));
    }

    #[test]
    fn flag_off_selects_no_discoverer() {
        let selected = select_discoverer(false, &["en".to_string()], Some(Arc::new(EmptySource)));
        assert!(selected.is_none());
    }

    #[test]
    fn missing_source_selects_no_discoverer() {
        let selected = select_discoverer(true, &["en".to_string()], None);
        assert!(selected.is_none());
    }

    #[test]
    fn canonical_url_collapses_root() {
        assert_eq!(canonical_url("https://a.com/", "/"), "https://a.com");
        assert_eq!(canonical_url("https://a.com", "/faqs"), "https://a.com/faqs");
    }
}
