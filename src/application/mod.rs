//! Application services: sitemap pipeline, route discovery, language
//! resolution, and cached page-settings lookup.

pub mod discovery;
pub mod error;
pub mod language;
pub mod page_settings;
pub mod sitemap;
