//! Filesystem-backed route discovery.
//!
//! Dynamic routes are derived from page files in a configured directory,
//! mirroring how the site's deployable pages are laid out. An unconfigured
//! directory is not an error; it just contributes no dynamic routes.

use std::path::PathBuf;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::discovery::{ChangeFreq, DiscoveredRoute, DiscoveryError, RouteSource};
use crate::application::sitemap::TOP_LEVEL_ROUTES;

const DYNAMIC_ROUTE_PRIORITY: f32 = 0.6;

pub struct FsRouteSource {
    pages_dir: Option<PathBuf>,
}

impl FsRouteSource {
    pub fn new(pages_dir: Option<PathBuf>) -> Self {
        Self { pages_dir }
    }
}

#[async_trait]
impl RouteSource for FsRouteSource {
    async fn dynamic_routes(&self) -> Result<Vec<DiscoveredRoute>, DiscoveryError> {
        let Some(dir) = self.pages_dir.as_ref() else {
            return Ok(Vec::new());
        };

        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|err| DiscoveryError::Source(format!("{}: {err}", dir.display())))?;

        let mut routes = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|err| DiscoveryError::Source(err.to_string()))?
        {
            let path = entry.path();
            let Some(stem) = page_stem(&path) else {
                continue;
            };
            let route = format!("/{stem}");
            if TOP_LEVEL_ROUTES.contains(&route.as_str()) {
                continue;
            }

            let lastmod = entry
                .metadata()
                .await
                .ok()
                .and_then(|meta| meta.modified().ok())
                .map(OffsetDateTime::from);

            routes.push(DiscoveredRoute {
                path: route,
                lastmod,
                changefreq: ChangeFreq::Weekly,
                priority: DYNAMIC_ROUTE_PRIORITY,
            });
        }

        routes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(routes)
    }
}

/// Route stem for a page file: `foo.html` → `foo`. `index.html` maps to the
/// root route, which the top-level list already covers.
fn page_stem(path: &std::path::Path) -> Option<&str> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
        return None;
    }
    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some("index") | None => None,
        Some(stem) => Some(stem),
    }
}
