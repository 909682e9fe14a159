//! Vetrina: a content-delivery front end.
//!
//! Serves a resilient XML sitemap (full generation with a static fallback),
//! robots.txt, and a language-aware cached page-settings lookup. Page
//! rendering itself lives elsewhere; this crate owns the pieces where a
//! defect would cause silent correctness bugs rather than a visual glitch.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
