use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use farm_assist::channels::{
    ChannelManager, ChannelReplier, CliChannel, WhatsAppChannel, health_router,
};
use farm_assist::config::{AppConfig, EngineConfig};
use farm_assist::dialogue::{Collaborators, DialogueEngine};
use farm_assist::services::{
    AdviceGenerator, FeedbackProcessor, GeminiClient, OfflineAdvisor, OpenWeatherClient,
    SimulatedMarket, SimulatedWeather, WeatherProvider,
};
use farm_assist::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::from_env().context("invalid configuration")?;
    let engine_config = EngineConfig::from_env().context("invalid engine configuration")?;

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _log_guard = init_tracing(&app_config);

    eprintln!("🌱 Farm Assist v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&app_config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", app_config.db_path.display()))?,
    );
    eprintln!("   Database: {}", app_config.db_path.display());

    // ── Collaborators ────────────────────────────────────────────────────
    let advisor: Arc<dyn AdviceGenerator>;
    let feedback: Arc<dyn FeedbackProcessor>;
    match app_config.gemini_api_key.clone() {
        Some(key) => {
            let gemini = Arc::new(GeminiClient::new(key, app_config.gemini_model.clone()));
            eprintln!("   AI: Gemini ({})", gemini.model_name());
            advisor = gemini.clone();
            feedback = gemini;
        }
        None => {
            eprintln!("   AI: offline templates (GEMINI_API_KEY not set)");
            advisor = Arc::new(OfflineAdvisor);
            feedback = Arc::new(OfflineAdvisor);
        }
    }

    let weather: Arc<dyn WeatherProvider> = match app_config.openweather_api_key.clone() {
        Some(key) => {
            eprintln!("   Weather: OpenWeather");
            Arc::new(OpenWeatherClient::new(key))
        }
        None => {
            eprintln!("   Weather: simulated (OPENWEATHER_API_KEY not set)");
            Arc::new(SimulatedWeather)
        }
    };

    let collaborators = Collaborators {
        weather,
        market: Arc::new(SimulatedMarket::new()),
        advisor,
        feedback,
        profiles: db.clone(),
    };

    let engine = Arc::new(DialogueEngine::new(engine_config, db, collaborators));

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    channels.add(Box::new(CliChannel::new()));

    let mut webhooks = None;
    if let Some(whatsapp_config) = app_config.whatsapp.clone() {
        let whatsapp = WhatsAppChannel::new(whatsapp_config);
        webhooks = Some(whatsapp.router());
        channels.add(Box::new(whatsapp));
        eprintln!(
            "   WhatsApp: webhook at http://0.0.0.0:{}/webhook/whatsapp",
            app_config.http_port
        );
    }
    eprintln!("   Channels: {}\n", channels.names().join(", "));
    let channels = Arc::new(channels);

    let mut app = health_router(Arc::clone(&channels));
    if let Some(webhooks) = webhooks {
        app = app.merge(webhooks);
    }
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", app_config.http_port))
        .await
        .with_context(|| format!("failed to bind port {}", app_config.http_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });
    tracing::info!(port = app_config.http_port, "HTTP server started");

    // ── Dispatch loop ────────────────────────────────────────────────────
    let mut inbound = channels.start_all().await?;
    tracing::info!("Farm Assist ready and listening");

    loop {
        let message = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
                break;
            }
            msg = inbound.next() => match msg {
                Some(m) => m,
                None => {
                    tracing::info!("All channel streams ended, shutting down...");
                    break;
                }
            },
        };

        // Each message runs on its own task; the engine serializes per sender.
        let engine = Arc::clone(&engine);
        let replier = ChannelReplier::new(Arc::clone(&channels), message);
        tokio::spawn(async move {
            engine
                .handle_channel_message(replier.message(), &replier)
                .await;
        });
    }

    channels.shutdown_all().await?;
    Ok(())
}

/// Console logging, plus a daily rolling file when a log directory is set.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match config.log_dir.as_ref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "farm-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}
