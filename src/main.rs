use std::{process, sync::Arc, time::Duration};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vetrina::{
    application::{
        discovery::select_discoverer,
        error::AppError,
        language::{LanguageStore, StoreLanguageProvider},
        page_settings::{PageSettingsService, SettingsFetcher},
        sitemap::SitemapService,
    },
    cache::{CacheClient, CachePolicy},
    config,
    infra::{
        http::{HttpState, build_router},
        routes::FsRouteSource,
        settings_api::{HttpSettingsFetcher, UnconfiguredSettingsFetcher},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let language_store = Arc::new(LanguageStore::default());
    language_store.set_language(settings.site.default_language.clone());
    let language = Arc::new(StoreLanguageProvider::new(language_store));

    let cache_client = Arc::new(CacheClient::new(CachePolicy::from(&settings.cache)));

    let fetcher: Arc<dyn SettingsFetcher> = match settings.site.settings_api_url.clone() {
        Some(endpoint) => Arc::new(HttpSettingsFetcher::new(endpoint)),
        None => Arc::new(UnconfiguredSettingsFetcher),
    };
    let page_settings = Arc::new(PageSettingsService::new(fetcher, cache_client, language));

    let route_source = Arc::new(FsRouteSource::new(settings.site.pages_dir.clone()));
    let discoverer = select_discoverer(
        settings.site.enable_seo,
        &settings.site.languages,
        Some(route_source),
    );
    let sitemap = Arc::new(SitemapService::new(&settings.site, discoverer));

    let state = HttpState {
        sitemap,
        page_settings,
    };
    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = build_router(state, settings.site.enable_seo);

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr).await?;
    info!(
        target = "vetrina::serve",
        addr = %settings.server.public_addr,
        seo_enabled = settings.site.enable_seo,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown handler");
        return;
    }
    info!(
        target = "vetrina::serve",
        grace_secs = grace.as_secs(),
        "shutdown signal received, draining connections"
    );

    // Bound the drain: if connections outlive the grace window, exit anyway.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "vetrina::serve",
            "graceful shutdown window elapsed, exiting"
        );
        process::exit(0);
    });
}
