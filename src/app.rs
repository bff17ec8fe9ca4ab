use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::pocket;
use crate::server;

/// Process entry point: load configuration, wire up the optional
/// collaborators, then serve until the process is killed.
pub fn run() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = Config::from_env().context("load configuration")?;

    // Keep the guard alive for the lifetime of the server loop.
    let _sentry = cfg.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let pocket = match cfg.pocket.as_ref() {
        Some(pocket_cfg) => Some(
            pocket::Client::new(pocket::ClientConfig {
                consumer_key: pocket_cfg.consumer_key.clone(),
                access_token: pocket_cfg.access_token.clone(),
                ..pocket::ClientConfig::default()
            })
            .context("build pocket client")?,
        ),
        None => None,
    };

    tracing::info!(
        port = cfg.port,
        max_images = cfg.max_images,
        fixed_credentials = cfg.fever.is_some(),
        pocket = pocket.is_some(),
        error_reporting = cfg.sentry_dsn.is_some(),
        "starting rss-waterfall"
    );

    server::serve(server::Options {
        port: cfg.port,
        max_images: cfg.max_images,
        fixed_credentials: cfg.fever,
        pocket,
    })
}
