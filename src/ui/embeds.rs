use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{audio::controller::SessionSnapshot, catalog::Song};

/// Paleta de colores del bot
pub mod colors {
    use serenity::all::Colour;

    pub const MAIN_PURPLE: Colour = Colour::from_rgb(106, 13, 173);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
}

/// Footer estandarizado para los embeds informativos
const STANDARD_FOOTER: &str = "🎵 WRLD Player · powered by juicewrldapi.com";

/// Canciones de la cola que se listan antes de resumir el resto
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Canciones que muestra el panel de debug
const DEBUG_PREVIEW: usize = 3;

/// Límite de Discord para la descripción de un embed
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;

/// Texto del anuncio que se publica al empezar cada canción
pub fn now_playing_announcement(song: &Song) -> String {
    format!(
        "🎵 Now Playing: **{}** (Prod. {}) - {}\nDuration: {}",
        song.display_name(),
        song.producers.as_deref().unwrap_or("Unknown"),
        song.category.title(),
        song.length.as_deref().unwrap_or("Unknown"),
    )
}

/// Confirmación de `play`; `position` solo se muestra si la canción quedó en cola
pub fn create_song_added_embed(
    song: &Song,
    position: Option<usize>,
    thumbnail: Option<String>,
) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new("+ Song Added"))
        .title(song.display_name())
        .description(format!(
            "Prod. {}",
            song.producers.as_deref().unwrap_or("Unknown")
        ))
        .color(colors::MAIN_PURPLE)
        .field("Length", song.length.as_deref().unwrap_or("N/A"), true)
        .field("Category", song.category.title(), true);

    if let Some(position) = position {
        embed = embed.field("Position", format!("#{}", position), true);
    }

    if let Some(thumbnail) = thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Detalle de la canción actual (`nowplaying`)
pub fn create_now_playing_embed(song: &Song, thumbnail: Option<String>) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new("Now Playing in VC"))
        .title(song.display_name())
        .description(format!(
            "Prod. {}\nEng. {}",
            song.producers.as_deref().unwrap_or("Unknown"),
            song.engineers.as_deref().unwrap_or("Unknown"),
        ))
        .color(colors::MAIN_PURPLE);

    let details = song_details(song);
    if !details.is_empty() {
        embed = embed.field("Details", details.join("\n"), false);
    }

    if let Some(thumbnail) = thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

fn song_details(song: &Song) -> Vec<String> {
    let mut details = Vec::new();
    if let Some(artists) = &song.credited_artists {
        details.push(format!("Artist(s): {}", artists));
    }
    if let Some(length) = &song.length {
        details.push(format!("Duration: {}", length));
    }
    if !song.category.as_str().is_empty() {
        details.push(format!("Type: {}", song.category.title()));
    }
    if let Some(era) = song.era_name() {
        details.push(format!("Era: {}", era));
    }
    details
}

/// Muestra la canción actual y la cola (`queue`)
pub fn create_queue_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Current Playlist")
        .color(colors::MAIN_PURPLE);

    if let Some(song) = &snapshot.current {
        let mut text = format!(
            "**{}**\n{}",
            song.display_name(),
            song.era_name().unwrap_or("Unknown")
        );
        if let Some(length) = &song.length {
            text.push_str(&format!(" • {}", length));
        }
        embed = embed.field("Now Playing", text, false);
    }

    let lines = queue_lines(&snapshot.queue);
    if !lines.is_empty() {
        embed = embed.field("Queue", lines.join("\n"), false);
    }

    embed.footer(CreateEmbedFooter::new(format!(
        "{} songs in queue",
        snapshot.queue.len()
    )))
}

/// Líneas numeradas de la cola, con un resumen si hay más de una página
pub fn queue_lines(queue: &[Song]) -> Vec<String> {
    let mut lines: Vec<String> = queue
        .iter()
        .take(QUEUE_PAGE_SIZE)
        .enumerate()
        .map(|(i, song)| {
            let mut line = format!(
                "`{}.` **{}** - {} - {}",
                i + 1,
                song.display_name(),
                song.era_name().unwrap_or("Unknown"),
                song.category.title(),
            );
            if let Some(length) = &song.length {
                line.push_str(&format!(" • {}", length));
            }
            line
        })
        .collect();

    if queue.len() > QUEUE_PAGE_SIZE {
        lines.push(format!("*...and {} more*", queue.len() - QUEUE_PAGE_SIZE));
    }

    lines
}

/// Estado de la conexión de voz para el panel de debug
#[derive(Debug, Clone)]
pub struct VoiceInfo {
    pub channel_name: String,
    pub bitrate: Option<u32>,
    pub members: usize,
}

/// Panel de diagnóstico (`debug`)
pub fn create_debug_embed(voice: Option<&VoiceInfo>, snapshot: &SessionSnapshot) -> CreateEmbed {
    let status = if snapshot.is_paused {
        "Paused"
    } else if snapshot.is_playing {
        "Playing"
    } else {
        "Idle"
    };

    let voice_info = match voice {
        Some(voice) => format!(
            "Channel: `{}`\nConnected: `{}`\nState: `{}`\nBitrate: `{}`\nMembers: `{}`",
            voice.channel_name,
            snapshot.connected,
            status,
            voice
                .bitrate
                .map_or("Unknown".to_string(), |b| format!("{} kbps", b / 1000)),
            voice.members,
        ),
        None => "Not Connected".to_string(),
    };

    let song_info = match &snapshot.current {
        Some(song) => format!(
            "Name: `{}`\nCategory: `{}`\nDuration: `{}`\nHas Path: `{}`",
            song.display_name(),
            song.category.title(),
            song.length.as_deref().unwrap_or("Unknown"),
            song.audio_path().is_some(),
        ),
        None => "No current song".to_string(),
    };

    let preview: Vec<String> = snapshot
        .queue
        .iter()
        .take(DEBUG_PREVIEW)
        .enumerate()
        .map(|(i, song)| format!("{}. {}", i + 1, song.display_name()))
        .collect();
    let preview = if preview.is_empty() {
        "Queue empty".to_string()
    } else {
        preview.join("\n")
    };

    CreateEmbed::new()
        .author(CreateEmbedAuthor::new("Music Debug Panel"))
        .color(colors::MAIN_PURPLE)
        .field("Voice Client", voice_info, false)
        .field("Current Song", song_info, false)
        .field(
            "Queue",
            format!("Size: `{}`\nPreview:\n{}", snapshot.queue.len(), preview),
            false,
        )
        .field(
            "Player Flags",
            format!(
                "Playing: `{}`\nPaused: `{}`\nRadio Mode: `{}`",
                snapshot.is_playing, snapshot.is_paused, snapshot.radio_mode
            ),
            false,
        )
        .timestamp(Timestamp::now())
}

pub fn create_ping_embed(gateway: Option<Duration>, response: Duration) -> CreateEmbed {
    CreateEmbed::new()
        .author(CreateEmbedAuthor::new("Pong!"))
        .color(colors::MAIN_PURPLE)
        .field(
            "API Latency",
            gateway.map_or("N/A".to_string(), |d| format!("{}ms", d.as_millis())),
            true,
        )
        .field("Response", format!("{}ms", response.as_millis()), true)
}

/// Datos que muestra `about`
#[derive(Debug, Clone)]
pub struct BotStats {
    pub uptime: Duration,
    pub guilds: usize,
    pub users: usize,
    pub sessions: usize,
    pub commands: usize,
}

pub fn create_about_embed(stats: &BotStats) -> CreateEmbed {
    CreateEmbed::new()
        .title("WRLD Player")
        .description(format!(
            "WRLD Player streams Juice WRLD songs from juicewrldapi.com into voice channels. \
            Built in Rust v{} with serenity and songbird.",
            env!("CARGO_PKG_VERSION")
        ))
        .color(colors::MAIN_PURPLE)
        .field(
            "📊 Stats",
            format!(
                "`{}` uptime\n`{}` servers\n`{}` users\n`{}` active players\n`{}` commands\n`{} {}` OS",
                format_uptime(stats.uptime),
                stats.guilds,
                stats.users,
                stats.sessions,
                stats.commands,
                std::env::consts::OS,
                std::env::consts::ARCH,
            ),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Lista de comandos para `help`
pub fn help_text(prefix: &str) -> String {
    let commands = [
        "play <song> - plays the specified song, accepts name OR direct url (ex. https://juicewrldapi.com/juicewrld/songs/25/)",
        "join - joins your voice channel",
        "pause - pauses the current song",
        "resume - resumes playback",
        "skip - skips current song",
        "queue / q - shows the queue",
        "nowplaying / np - shows the current song playing",
        "radio - enables randomly playing songs",
        "stopradio - disables radio",
        "ping - bot connection info",
        "about - bot information",
    ];

    format!("Prefix: `{}` ```{}```", prefix, commands.join("\n"))
}

pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .description(format!("❌ {}", description))
        .color(colors::ERROR_RED)
}

/// Embeds efímeros con la letra, uno por fragmento
pub fn create_lyrics_embeds(lyrics: &str) -> Vec<CreateEmbed> {
    chunk_lyrics(lyrics, EMBED_DESCRIPTION_LIMIT)
        .into_iter()
        .map(|chunk| CreateEmbed::new().description(chunk).color(colors::MAIN_PURPLE))
        .collect()
}

/// Parte la letra en fragmentos de como máximo `limit` caracteres,
/// cortando en saltos de línea siempre que se pueda.
pub fn chunk_lyrics(lyrics: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in lyrics.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            // Una sola línea más larga que el límite: cortar por caracteres
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                let piece: String = piece.iter().collect();
                if piece.chars().count() == limit {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Formatea el uptime como `1d 2h 3m 4s`, omitiendo unidades en cero (salvo segundos)
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let (minutes, seconds) = (rem / 60, rem % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_song;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0s");
        assert_eq!(format_uptime(Duration::from_secs(59)), "59s");
        assert_eq!(format_uptime(Duration::from_secs(3_600 + 5)), "1h 5s");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5)),
            "2d 3h 4m 5s"
        );
    }

    #[test]
    fn test_chunk_lyrics_keeps_lines_together() {
        let lyrics = "aaaa\nbbbb\ncccc\n";
        let chunks = chunk_lyrics(lyrics, 10);

        assert_eq!(chunks, vec!["aaaa\nbbbb\n".to_string(), "cccc\n".to_string()]);
        assert_eq!(chunks.concat(), lyrics);
    }

    #[test]
    fn test_chunk_lyrics_splits_long_lines() {
        let lyrics = format!("{}\nend", "x".repeat(25));
        let chunks = chunk_lyrics(&lyrics, 10);

        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), lyrics);
    }

    #[test]
    fn test_chunk_lyrics_short_text_is_single_chunk() {
        assert_eq!(chunk_lyrics("one line", 4096), vec!["one line".to_string()]);
        assert!(chunk_lyrics("", 4096).is_empty());
    }

    #[test]
    fn test_queue_lines_summarizes_overflow() {
        let queue: Vec<Song> = (1..=12).map(|i| test_song(i, &format!("Song {}", i))).collect();
        let lines = queue_lines(&queue);

        assert_eq!(lines.len(), QUEUE_PAGE_SIZE + 1);
        assert_eq!(lines[0], "`1.` **Song 1** - Unknown - Released • 3:00");
        assert_eq!(lines.last().unwrap(), "*...and 2 more*");
    }

    #[test]
    fn test_now_playing_announcement() {
        let mut song = test_song(25, "Lucid Dreams");
        song.producers = Some("Nick Mira".to_string());

        assert_eq!(
            now_playing_announcement(&song),
            "🎵 Now Playing: **Lucid Dreams** (Prod. Nick Mira) - Released\nDuration: 3:00"
        );
    }

    #[test]
    fn test_help_lists_prefix() {
        let help = help_text("..");
        assert!(help.starts_with("Prefix: `..`"));
        assert!(help.contains("stopradio - disables radio"));
    }
}
