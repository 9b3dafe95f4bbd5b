use anyhow::{Context, Result};
use companion_api::config::Config;
use companion_api::{AppState, app, generator_from_config, prompt_loader};
use std::net::SocketAddr;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let persona = prompt_loader::load_persona(&config.prompts_dir)
        .context("Failed to load persona prompt")?;
    match &persona {
        Some(_) => tracing::info!("Using persona from {}", config.prompts_dir.display()),
        None => tracing::info!("No persona prompt found, using the built-in one"),
    }

    let generator = generator_from_config(&config, persona);
    let providers = generator.provider_names();
    if providers.is_empty() {
        tracing::warn!("No OPENAI_API_KEY or ANTHROPIC_API_KEY set; replies will explain the missing credentials");
    } else {
        tracing::info!("Provider chain: {}", providers.join(" -> "));
    }

    let router = app(AppState::new(generator));

    tracing::info!("Starting chat server, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
