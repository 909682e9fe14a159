//! Infrastructure adapters: HTTP surface, telemetry, and outbound clients.

pub mod http;
pub mod routes;
pub mod settings_api;
pub mod telemetry;
