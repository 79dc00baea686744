use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod dashboard;
mod logsink;
mod orchestrator;
mod sources;
mod storage;
mod ui;

use crate::audio::{PlaybackTransport, VoiceTransport};
use crate::bot::gateway::SerenityGateway;
use crate::bot::SalaMusicBot;
use crate::config::Config;
use crate::dashboard::BotStatus;
use crate::logsink::LogSink;
use crate::orchestrator::{OrchestratorRegistry, RoomGateway, Services};
use crate::sources::{InvidiousResolver, ResolverChain, TrackResolver, YtDlpResolver};
use crate::storage::JsonStorage;

fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sala_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Sala Music Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    // Sink de logs compartido con el dashboard
    let logs = Arc::new(LogSink::new(config.log_capacity));
    logs.info("Arrancando Sala Music Bot...");

    // Almacenamiento JSON
    let storage = Arc::new(tokio::sync::Mutex::new(
        JsonStorage::new(config.data_dir.clone()).await?,
    ));

    let status = Arc::new(BotStatus::new());

    // Voz y colaboradores del orquestador
    let songbird = Songbird::serenity();
    let gateway = Arc::new(SerenityGateway::new(songbird.clone()));
    let transport: Arc<dyn PlaybackTransport> = Arc::new(VoiceTransport::new(songbird.clone()));

    // Cadena de resolución: Invidious primero, yt-dlp de respaldo
    let resolver: Arc<dyn TrackResolver> = Arc::new(ResolverChain::new(
        vec![
            Arc::new(InvidiousResolver::new()),
            Arc::new(YtDlpResolver::new()),
        ],
        config.resolver_timeout(),
    ));

    let room_gateway: Arc<dyn RoomGateway> = gateway.clone();
    let services = Services {
        resolver,
        transport,
        gateway: room_gateway,
        storage: storage.clone(),
        logs: logs.clone(),
        timings: config.timings(),
    };
    let registry = OrchestratorRegistry::new(services);

    // Dashboard HTTP + WebSocket
    {
        let port = config.dashboard_port;
        let status = status.clone();
        let logs = logs.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = dashboard::serve(port, status, logs, registry).await {
                error!("Dashboard caído: {:?}", e);
            }
        });
    }

    // Cliente Discord
    let handler = SalaMusicBot::new(
        config.clone(),
        registry,
        gateway,
        storage,
        logs.clone(),
        status.clone(),
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Shutdown graceful
    {
        let status = status.clone();
        let logs = logs.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Error al registrar Ctrl+C");
            info!("⚠️ Señal de shutdown recibida, cerrando...");
            status.set_online(false);
            logs.info("Bot apagándose");
            std::process::exit(0);
        });
    }

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
