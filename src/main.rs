use anyhow::{Context as _, Result};
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod catalog;
mod config;
mod ui;

use crate::audio::session::SessionRegistry;
use crate::bot::{MusicBot, ShardManagerContainer};
use crate::catalog::{CatalogClient, SongCatalog};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wrld_player=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando WRLD Player v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración (sin token no hay bot)
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuración inválida: {:#}", e);
            return Err(e);
        }
    };
    info!("{}", config.summary());

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Cliente del catálogo (con timeout) y cliente para streams (sin timeout total)
    let catalog = Arc::new(
        CatalogClient::new(&config.catalog_url, config.http_timeout)
            .context("No se pudo crear el cliente del catálogo")?,
    );
    let stream_http = reqwest::Client::builder()
        .connect_timeout(config.http_timeout)
        .build()?;

    let sessions = Arc::new(SessionRegistry::new(
        catalog.clone() as Arc<dyn SongCatalog>,
        config.radio_attempts,
    ));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Crear handler del bot
    let handler = MusicBot::new(config.clone(), catalog, sessions, stream_http);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    {
        let mut data = client.data.write().await;
        data.insert::<ShardManagerContainer>(client.shard_manager.clone());
    }

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar el transcodificador
    let ffmpeg = async_process::Command::new(&config.audio.ffmpeg_path)
        .arg("-version")
        .output()
        .await?;

    if ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg no disponible en {}", config.audio.ffmpeg_path.display());
    }
}
