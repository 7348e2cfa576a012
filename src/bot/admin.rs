//! Comandos de administración: `leave`, `stop`, `restart` y `debug`.
//!
//! Requieren el rol `ADMIN_ROLE` cuando está configurado y existe en la guild.

use anyhow::Result;
use serenity::{
    model::{
        channel::Message,
        id::{GuildId, RoleId},
    },
    prelude::Context,
};
use tracing::{debug, info, warn};

use crate::{
    bot::{bot_voice_channel, handlers::{reply, reply_embed, say}, MusicBot},
    ui::embeds::{self, VoiceInfo},
};

/// Verifica el rol de administración.
///
/// Sin rol configurado, o si el rol ya no existe en la guild, cualquiera pasa.
pub async fn is_admin(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    admin_role: Option<u64>,
) -> bool {
    let Some(role_id) = admin_role.map(RoleId::new) else {
        return true;
    };

    let role_exists = match guild_id.to_guild_cached(&ctx.cache) {
        Some(guild) => guild.roles.contains_key(&role_id),
        None => true,
    };
    if !role_exists {
        return true;
    }

    if let Some(member) = &msg.member {
        return member.roles.contains(&role_id);
    }

    match guild_id.member(&ctx.http, msg.author.id).await {
        Ok(member) => member.roles.contains(&role_id),
        Err(e) => {
            debug!("No se pudo obtener el miembro {}: {:?}", msg.author.id, e);
            false
        }
    }
}

pub async fn handle_leave(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let session = bot.sessions().remove(guild_id).filter(|s| !s.is_closed());
    let in_voice = bot_voice_channel(ctx, guild_id).await.is_some();

    if session.is_none() && !in_voice {
        return reply(ctx, msg, "Not in a vc.").await;
    }

    match session {
        Some(session) => {
            if let Err(e) = session.leave().await {
                debug!("Sesión de guild {} ya cerrada: {}", guild_id, e);
            }
        }
        None => {
            // Conectado sin sesión (p. ej. tras reiniciar): soltar la llamada directamente
            if let Some(manager) = songbird::get(ctx).await {
                manager.remove(guild_id).await?;
            }
        }
    }

    say(ctx, msg.channel_id, "Disconnected.").await
}

pub async fn handle_stop(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let session = bot.sessions().get(guild_id);
    let connected = match &session {
        Some(session) => session.snapshot().await?.connected,
        None => false,
    };

    match session {
        Some(session) if connected => {
            session.stop().await?;
            say(ctx, msg.channel_id, "Stopped and cleared all Player flags.").await
        }
        _ => reply(ctx, msg, "Not connected to vc.").await,
    }
}

/// Reinicia el proceso con los mismos argumentos
pub async fn handle_restart(ctx: &Context, msg: &Message, bot: &MusicBot) -> Result<()> {
    reply(ctx, msg, "OK").await?;
    info!("🔄 Reinicio solicitado por {}", msg.author.name);

    for session in bot.sessions().drain() {
        if let Err(e) = session.leave().await {
            debug!("Sesión de guild {} ya cerrada: {}", session.guild_id(), e);
        }
    }

    restart_process()
}

#[cfg(unix)]
fn restart_process() -> Result<()> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    // `exec` solo retorna si falló
    let err = std::process::Command::new(&exe).args(&args).exec();
    warn!("❌ No se pudo reiniciar {}: {}", exe.display(), err);
    Err(err.into())
}

#[cfg(not(unix))]
fn restart_process() -> Result<()> {
    let exe = std::env::current_exe()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    std::process::Command::new(&exe).args(&args).spawn()?;
    std::process::exit(0);
}

pub async fn handle_debug(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let snapshot = match bot.sessions().get(guild_id) {
        Some(session) => session.snapshot().await?,
        None => Default::default(),
    };

    let voice = match bot_voice_channel(ctx, guild_id).await {
        Some(channel_id) => guild_id.to_guild_cached(&ctx.cache).map(|guild| VoiceInfo {
            channel_name: guild
                .channels
                .get(&channel_id)
                .map(|channel| channel.name.clone())
                .unwrap_or_else(|| channel_id.to_string()),
            bitrate: guild.channels.get(&channel_id).and_then(|channel| channel.bitrate),
            members: guild
                .voice_states
                .values()
                .filter(|state| state.channel_id == Some(channel_id))
                .count(),
        }),
        None => None,
    };

    reply_embed(ctx, msg, embeds::create_debug_embed(voice.as_ref(), &snapshot)).await
}
