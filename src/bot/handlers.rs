use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateMessage, EditMessage,
    },
    model::{
        application::ComponentInteraction,
        channel::Message,
        id::{ChannelId, GuildId},
    },
    prelude::Context,
};
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    audio::controller::{ControlOutcome, RadioOutcome},
    bot::{
        admin, bot_voice_channel,
        commands::{BotCommand, Invocation, COMMAND_COUNT},
        user_voice_channel, MusicBot, ShardManagerContainer,
    },
    catalog::{CatalogError, Song, SongCatalog, SongQuery},
    ui::embeds,
};

const NOT_IN_VOICE: &str = "You need to be in a vc.";
const NOTHING_PLAYING: &str = "Nothing is playing.";
const NOTHING_PAUSED: &str = "Nothing is paused.";

/// Despacha un comando ya parseado
pub async fn handle_command(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    invocation: Invocation,
    bot: &MusicBot,
) -> Result<()> {
    match invocation.command {
        BotCommand::Help => reply(ctx, msg, embeds::help_text(&invocation.prefix)).await?,
        BotCommand::Join => handle_join(ctx, msg, guild_id, bot).await?,
        BotCommand::Play(query) => handle_play(ctx, msg, guild_id, query, &invocation.prefix, bot).await?,
        BotCommand::Pause => handle_pause(ctx, msg, guild_id, bot).await?,
        BotCommand::Resume => handle_resume(ctx, msg, guild_id, bot).await?,
        BotCommand::Skip => handle_skip(ctx, msg, guild_id, bot).await?,
        BotCommand::Queue => handle_queue(ctx, msg, guild_id, bot).await?,
        BotCommand::NowPlaying => handle_nowplaying(ctx, msg, guild_id, bot).await?,
        BotCommand::Radio => handle_radio(ctx, msg, guild_id, bot).await?,
        BotCommand::StopRadio => handle_stop_radio(ctx, msg, guild_id, bot).await?,
        BotCommand::Ping => handle_ping(ctx, msg).await?,
        BotCommand::About => handle_about(ctx, msg, bot).await?,
        BotCommand::Leave => admin::handle_leave(ctx, msg, guild_id, bot).await?,
        BotCommand::Stop => admin::handle_stop(ctx, msg, guild_id, bot).await?,
        BotCommand::Restart => admin::handle_restart(ctx, msg, bot).await?,
        BotCommand::Debug => admin::handle_debug(ctx, msg, guild_id, bot).await?,
    }

    Ok(())
}

async fn handle_join(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, msg.author.id) else {
        return reply(ctx, msg, NOT_IN_VOICE).await;
    };

    let session = bot.session_for(ctx, guild_id, msg.channel_id);
    if bot_voice_channel(ctx, guild_id).await == Some(channel_id) && session.snapshot().await?.connected {
        return reply(ctx, msg, "I'm already here bruh").await;
    }

    bot.join_voice_channel(ctx, guild_id, channel_id, &session).await?;
    say(ctx, msg.channel_id, format!("Joined <#{}>", channel_id)).await
}

async fn handle_play(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    query: Option<String>,
    prefix: &str,
    bot: &MusicBot,
) -> Result<()> {
    let Some(query) = query else {
        return reply(ctx, msg, format!("Usage: `{}play <song or link>`", prefix)).await;
    };

    let Some(session) = bot.ensure_voice(ctx, guild_id, msg.author.id, msg.channel_id).await? else {
        return reply(ctx, msg, NOT_IN_VOICE).await;
    };

    let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

    let song = match lookup_song(bot.catalog(), &query).await {
        Ok(song) => song,
        Err(e) if e.is_empty_result() => {
            return reply(ctx, msg, format!("No results found for **{}**.", query)).await;
        }
        Err(e) => {
            warn!("❌ Error consultando el catálogo para '{}': {}", query, e);
            return reply(ctx, msg, "Couldn't reach the song catalog, try again in a bit.").await;
        }
    };

    if !song.category.is_playable() {
        return reply(
            ctx,
            msg,
            "Song must be Released or Unreleased. You can use the JSON url (ex. `https://juicewrldapi.com/juicewrld/songs/25/`)",
        )
        .await;
    }

    let thumbnail = thumbnail_for(bot, &song);
    let embed_song = song.clone();
    let outcome = session.play(song).await?;
    info!("➕ '{}' agregada en guild {}", embed_song.display_name(), guild_id);

    reply_embed(
        ctx,
        msg,
        embeds::create_song_added_embed(&embed_song, outcome.position, thumbnail),
    )
    .await
}

/// Un link del catálogo se resuelve por id, cualquier otra cosa es búsqueda
async fn lookup_song(catalog: &dyn SongCatalog, query: &str) -> Result<Song, CatalogError> {
    match SongQuery::parse(query) {
        SongQuery::Id(id) => catalog.fetch_by_id(id).await,
        SongQuery::Search(text) => catalog.search(&text).await,
    }
}

fn thumbnail_for(bot: &MusicBot, song: &Song) -> Option<String> {
    song.image_url
        .as_deref()
        .and_then(|path| bot.catalog().image_url(path))
}

async fn handle_pause(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let outcome = match bot.sessions().get(guild_id) {
        Some(session) => session.pause().await?,
        None => ControlOutcome::NothingPlaying,
    };

    match outcome {
        ControlOutcome::Done => say(ctx, msg.channel_id, "Paused ⏸️").await,
        _ => reply(ctx, msg, NOTHING_PLAYING).await,
    }
}

async fn handle_resume(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let outcome = match bot.sessions().get(guild_id) {
        Some(session) => session.resume().await?,
        None => ControlOutcome::NothingPaused,
    };

    match outcome {
        ControlOutcome::Done => say(ctx, msg.channel_id, "Resumed ▶️").await,
        _ => reply(ctx, msg, NOTHING_PAUSED).await,
    }
}

async fn handle_skip(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let outcome = match bot.sessions().get(guild_id) {
        Some(session) => session.skip().await?,
        None => ControlOutcome::NothingPlaying,
    };

    match outcome {
        ControlOutcome::Done => say(ctx, msg.channel_id, "Skipped ⏭️").await,
        _ => reply(ctx, msg, NOTHING_PLAYING).await,
    }
}

async fn handle_queue(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let snapshot = match bot.sessions().get(guild_id) {
        Some(session) => session.snapshot().await?,
        None => Default::default(),
    };

    if snapshot.current.is_none() && snapshot.queue.is_empty() {
        return reply(ctx, msg, "Queue is empty.").await;
    }

    reply_embed(ctx, msg, embeds::create_queue_embed(&snapshot)).await
}

async fn handle_nowplaying(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let current = match bot.sessions().get(guild_id) {
        Some(session) => session.snapshot().await?.current,
        None => None,
    };

    let Some(song) = current else {
        return reply(ctx, msg, NOTHING_PLAYING).await;
    };

    let thumbnail = thumbnail_for(bot, &song);
    reply_embed(ctx, msg, embeds::create_now_playing_embed(&song, thumbnail)).await
}

async fn handle_radio(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let Some(session) = bot.ensure_voice(ctx, guild_id, msg.author.id, msg.channel_id).await? else {
        return reply(ctx, msg, NOT_IN_VOICE).await;
    };

    let text = match session.radio().await? {
        RadioOutcome::AfterCurrent => "Radio enabled. It will start after the current song.",
        RadioOutcome::Started => "Radio enabled. Starting now...",
    };
    say(ctx, msg.channel_id, text).await
}

async fn handle_stop_radio(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    if let Some(session) = bot.sessions().get(guild_id) {
        session.stop_radio().await?;
    }
    say(ctx, msg.channel_id, "Radio disabled.").await
}

async fn handle_ping(ctx: &Context, msg: &Message) -> Result<()> {
    let gateway = {
        let data = ctx.data.read().await;
        match data.get::<ShardManagerContainer>() {
            Some(manager) => {
                let runners = manager.runners.lock().await;
                runners.get(&ctx.shard_id).and_then(|runner| runner.latency)
            }
            None => None,
        }
    };

    let start = Instant::now();
    let mut pending = msg.reply(&ctx.http, "Pinging...").await?;
    let response = start.elapsed();

    pending
        .edit(
            &ctx.http,
            EditMessage::new()
                .content("")
                .embed(embeds::create_ping_embed(gateway, response)),
        )
        .await?;
    Ok(())
}

async fn handle_about(ctx: &Context, msg: &Message, bot: &MusicBot) -> Result<()> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(bot.started_at())
        .to_std()
        .unwrap_or_default();

    let stats = embeds::BotStats {
        uptime,
        guilds: ctx.cache.guild_count(),
        users: ctx.cache.user_count(),
        sessions: bot.sessions().len(),
        commands: COMMAND_COUNT,
    };

    reply_embed(ctx, msg, embeds::create_about_embed(&stats)).await
}

/// Botón "Lyrics": responde con la letra en mensajes efímeros
pub async fn handle_lyrics_button(
    ctx: &Context,
    component: &ComponentInteraction,
    song_id: u64,
    bot: &MusicBot,
) -> Result<()> {
    info!("🔘 Letra de la canción {} pedida por {}", song_id, component.user.name);

    let lyrics = match bot.catalog().fetch_by_id(song_id).await {
        Ok(song) if song.has_lyrics() => song.lyrics.unwrap_or_default(),
        Ok(_) => String::new(),
        Err(e) => {
            warn!("No se pudo obtener la letra de {}: {}", song_id, e);
            String::new()
        }
    };

    let mut chunks = embeds::create_lyrics_embeds(&lyrics).into_iter();
    let first = chunks
        .next()
        .unwrap_or_else(|| embeds::create_error_embed("No lyrics available for this song."));

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(first)
                    .ephemeral(true),
            ),
        )
        .await?;

    for chunk in chunks {
        component
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .embed(chunk)
                    .ephemeral(true),
            )
            .await?;
    }

    Ok(())
}

// Funciones auxiliares

/// Respuesta citando el mensaje del usuario
pub(crate) async fn reply(ctx: &Context, msg: &Message, content: impl Into<String>) -> Result<()> {
    msg.reply(&ctx.http, content).await?;
    Ok(())
}

pub(crate) async fn reply_embed(ctx: &Context, msg: &Message, embed: CreateEmbed) -> Result<()> {
    msg.channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new().embed(embed).reference_message(msg),
        )
        .await?;
    Ok(())
}

/// Mensaje normal en el canal, sin citar
pub(crate) async fn say(ctx: &Context, channel_id: ChannelId, content: impl Into<String>) -> Result<()> {
    channel_id.say(&ctx.http, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{test_song, MockSongCatalog};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lookup_song_by_link_uses_id() {
        let mut catalog = MockSongCatalog::new();
        catalog
            .expect_fetch_by_id()
            .with(eq(25))
            .times(1)
            .returning(|id| Ok(test_song(id, "Lucid Dreams")));
        catalog.expect_search().never();

        let song = lookup_song(&catalog, "https://juicewrldapi.com/juicewrld/songs/25/")
            .await
            .unwrap();
        assert_eq!(song.id, 25);
    }

    #[tokio::test]
    async fn test_lookup_song_by_text_searches() {
        let mut catalog = MockSongCatalog::new();
        catalog.expect_fetch_by_id().never();
        catalog
            .expect_search()
            .withf(|q| q == "robbery")
            .times(1)
            .returning(|_| Err(CatalogError::NoResults));

        let err = lookup_song(&catalog, "robbery").await.unwrap_err();
        assert!(err.is_empty_result());
    }
}
