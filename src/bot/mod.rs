//! # Bot Module
//!
//! Discord front end for WRLD Player.
//!
//! This module contains:
//! - Prefix command parsing ([`commands`]) and dispatch ([`handlers`], [`admin`])
//! - Voice connection management (join, attach a transport to the guild session)
//! - Event handling (ready, messages, interactions, voice state updates)
//! - The announcement channel notifier ([`notifier`])
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`] trait. Playback state
//! lives in one session per guild ([`SessionRegistry`]); the bot only turns
//! messages into session requests and session outcomes into replies.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serenity::{
    all::{
        ActivityData, ChannelId, Context, EventHandler, GuildId, Interaction, Message, Ready,
        UserId, VoiceState,
    },
    async_trait,
    gateway::ShardManager,
    prelude::TypeMapKey,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod admin;
pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{
    audio::{
        controller::PlaybackNotifier,
        session::{SessionHandle, SessionRegistry},
        transport::SongbirdTransport,
    },
    catalog::CatalogClient,
    config::Config,
    ui::{buttons, embeds},
};
use notifier::DiscordNotifier;

/// Acceso al shard manager desde los comandos (latencia del gateway)
pub struct ShardManagerContainer;

impl TypeMapKey for ShardManagerContainer {
    type Value = Arc<ShardManager>;
}

/// Main Discord event handler.
///
/// ## Fields
///
/// - `config`: Bot configuration (prefix, admin role, audio settings)
/// - `catalog`: HTTP client for the song catalog
/// - `sessions`: Per-guild playback sessions
/// - `stream_http`: HTTP client for audio streams (no request timeout)
pub struct MusicBot {
    config: Arc<Config>,
    catalog: Arc<CatalogClient>,
    sessions: Arc<SessionRegistry>,
    stream_http: reqwest::Client,
    started_at: DateTime<Utc>,
}

impl MusicBot {
    pub fn new(
        config: Config,
        catalog: Arc<CatalogClient>,
        sessions: Arc<SessionRegistry>,
        stream_http: reqwest::Client,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            sessions,
            stream_http,
            started_at: Utc::now(),
        }
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Sesión de la guild, creándola si no existe.
    ///
    /// Los avisos van al canal configurado o, si no hay, al canal del comando.
    pub fn session_for(&self, ctx: &Context, guild_id: GuildId, text_channel: ChannelId) -> SessionHandle {
        let channel = self
            .config
            .notify_channel_id
            .map(ChannelId::new)
            .unwrap_or(text_channel);
        let http = ctx.http.clone();

        self.sessions.get_or_create(guild_id, move || {
            Arc::new(DiscordNotifier::new(http, channel)) as Arc<dyn PlaybackNotifier>
        })
    }

    /// Conecta (o mueve) el bot al canal de voz y engancha el transporte a la sesión.
    ///
    /// Si la sesión ya tiene transporte, `join` mueve la misma `Call` y el track
    /// en curso sigue bajo control del transporte existente.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        voice_channel: ChannelId,
        session: &SessionHandle,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = match manager.join(guild_id, voice_channel).await {
            Ok(call) => call,
            Err(e) => {
                error!("Error al obtener handler de voz: {:?}", e);
                return Err(anyhow::anyhow!("Error al conectar al canal de voz"));
            }
        };

        if session.snapshot().await?.connected {
            info!("🔀 Movido al canal de voz {} en guild {}", voice_channel, guild_id);
            return Ok(());
        }

        let transport = SongbirdTransport::new(
            guild_id,
            manager,
            call,
            self.stream_http.clone(),
            self.config.audio.clone(),
            session.track_events(),
        );
        session.attach(Arc::new(transport)).await?;

        info!("🔊 Conectado al canal de voz {} en guild {}", voice_channel, guild_id);
        Ok(())
    }

    /// Garantiza que el bot esté en voz antes de reproducir.
    ///
    /// Si ya está conectado no se mueve; si no, entra al canal del autor.
    /// Devuelve `None` cuando el autor no está en ningún canal de voz.
    pub async fn ensure_voice(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        author: UserId,
        text_channel: ChannelId,
    ) -> Result<Option<SessionHandle>> {
        let session = self.session_for(ctx, guild_id, text_channel);

        if bot_voice_channel(ctx, guild_id).await.is_some() && session.snapshot().await?.connected {
            return Ok(Some(session));
        }

        let Some(voice_channel) = user_voice_channel(ctx, guild_id, author) else {
            return Ok(None);
        };

        self.join_voice_channel(ctx, guild_id, voice_channel, &session).await?;
        Ok(Some(session))
    }
}

/// Canal de voz del usuario según la caché de la guild
pub fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

/// Canal de voz en el que está el bot, si lo está
pub async fn bot_voice_channel(ctx: &Context, guild_id: GuildId) -> Option<ChannelId> {
    let manager = songbird::get(ctx).await?;
    let call = manager.get(guild_id)?;
    let channel = call.lock().await.current_channel()?;
    Some(ChannelId::new(channel.0.get()))
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening(format!(
            "{}help",
            self.config.command_prefix
        ))));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let bot_id = ctx.cache.current_user().id;
        let Some(invocation) = commands::parse(&msg.content, &self.config.command_prefix, bot_id)
        else {
            return;
        };

        info!(
            "📝 Comando {} usado por {} en guild {}",
            invocation.command.name(),
            msg.author.name,
            guild_id
        );

        if invocation.command.requires_admin()
            && !admin::is_admin(&ctx, &msg, guild_id, self.config.admin_role_id).await
        {
            debug!("Comando {} ignorado: {} no es admin", invocation.command.name(), msg.author.name);
            return;
        }

        if let Err(e) = handlers::handle_command(&ctx, &msg, guild_id, invocation, self).await {
            error!("Error manejando comando: {:?}", e);
            let reply = serenity::builder::CreateMessage::new()
                .embed(embeds::create_error_embed("Something went wrong, try again."))
                .reference_message(&msg);
            if let Err(e) = msg.channel_id.send_message(&ctx.http, reply).await {
                warn!("No se pudo enviar mensaje de error: {:?}", e);
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            if let Some(song_id) = buttons::parse_lyrics_custom_id(&component.data.custom_id) {
                if let Err(e) = handlers::handle_lyrics_button(&ctx, &component, song_id, self).await {
                    error!("Error manejando botón de letra: {:?}", e);
                }
            }
        }
    }

    /// Si desconectan al bot del canal de voz, la sesión de la guild se descarta.
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Bot desconectado en guild {}", guild_id);

        if let Some(session) = self.sessions.remove(guild_id) {
            // Ya cerrada si la salida vino de `leave`
            if let Err(e) = session.leave().await {
                debug!("Sesión de guild {} ya cerrada: {}", guild_id, e);
            }
        }
    }
}
