//! Offer engine CLI: load one actor's offers from the backend and print them.
//!
//! Usage: `offer-engine <buyer|supplier> <actor-id>`

use offer_engine::http::HttpBackend;
use offer_engine::{EngineConfig, LoadOptions, OfferEngine, Role};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn parse_args() -> Option<(Role, String)> {
    let mut args = std::env::args().skip(1);
    let role = match args.next()?.as_str() {
        "buyer" => Role::Buyer,
        "supplier" => Role::Supplier,
        _ => return None,
    };
    let actor_id = args.next().filter(|id| !id.trim().is_empty())?;
    Some((role, actor_id))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some((role, actor_id)) = parse_args() else {
        eprintln!("usage: offer-engine <buyer|supplier> <actor-id>");
        std::process::exit(2);
    };

    let config: EngineConfig = config::Config::builder()
        .add_source(config::File::with_name("offers").required(false))
        .add_source(config::Environment::with_prefix("OFFERS"))
        .build()
        .and_then(|c| c.try_deserialize())
        .unwrap_or_else(|e| {
            let err_str = format!("{e}");
            if err_str.contains("not found") || err_str.contains("missing field") {
                warn!(error = %e, "No config file found, using defaults");
                EngineConfig::default()
            } else {
                error!(error = %e, "Config error: fix OFFERS_* env vars or offers.toml");
                std::process::exit(1);
            }
        });

    info!(backend = %config.backend_url, ttl_ms = config.cache_ttl_ms, "Configuration loaded");

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let engine = OfferEngine::new(config, backend);

    let offers = engine
        .load_offers(role, &actor_id, LoadOptions::default())
        .await;

    if let Some(message) = engine.snapshot().error {
        error!(%role, actor = %actor_id, error = %message, "Load failed");
        std::process::exit(1);
    }

    info!(%role, actor = %actor_id, count = offers.len(), "Offers loaded");
    println!("{}", serde_json::to_string_pretty(&offers)?);
    eprint!("{}", engine.metrics().render());
    Ok(())
}
