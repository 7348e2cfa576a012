use anyhow::{Context, Result};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Cómo se obtiene el audio de cada canción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBackend {
    /// Proceso ffmpeg externo que entrega PCM crudo
    Ffmpeg,
    /// Stream HTTP decodificado por Symphonia dentro de songbird
    Direct,
}

impl FromStr for AudioBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ffmpeg" => Ok(AudioBackend::Ffmpeg),
            "direct" | "http" => Ok(AudioBackend::Direct),
            other => anyhow::bail!("Unknown audio backend '{}', expected 'ffmpeg' or 'direct'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub backend: AudioBackend,
    pub ffmpeg_path: PathBuf,
    pub volume: f32,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,
    pub notify_channel_id: Option<u64>, // Canal de anuncios (now playing, cola terminada)
    pub admin_role_id: Option<u64>,

    // Catálogo
    pub catalog_url: String,
    pub http_timeout: Duration,
    pub radio_attempts: u32,

    // Audio
    pub audio: AudioSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de cualquier fuente clave/valor.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let discord_token = get("DISCORD_TOKEN")
            .or_else(|| get("TOKEN"))
            .context("DISCORD_TOKEN (or TOKEN) is not set")?;

        let config = Self {
            discord_token,
            command_prefix: get("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),
            notify_channel_id: get("CHANNEL")
                .map(|v| v.trim().parse())
                .transpose()
                .context("CHANNEL must be a channel id")?,
            admin_role_id: get("ADMIN_ROLE")
                .map(|v| v.trim().parse())
                .transpose()
                .context("ADMIN_ROLE must be a role id")?,

            catalog_url: get("CATALOG_URL").unwrap_or(defaults.catalog_url),
            http_timeout: match get("HTTP_TIMEOUT") {
                Some(v) => humantime::parse_duration(v.trim())
                    .with_context(|| format!("HTTP_TIMEOUT is not a duration: {}", v))?,
                None => defaults.http_timeout,
            },
            radio_attempts: match get("RADIO_ATTEMPTS") {
                Some(v) => v.trim().parse().context("RADIO_ATTEMPTS must be a number")?,
                None => defaults.radio_attempts,
            },

            audio: AudioSettings {
                backend: match get("AUDIO_BACKEND") {
                    Some(v) => v.parse()?,
                    None => defaults.audio.backend,
                },
                ffmpeg_path: get("FFMPEG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.audio.ffmpeg_path),
                volume: match get("DEFAULT_VOLUME") {
                    Some(v) => v.trim().parse().context("DEFAULT_VOLUME must be a number")?,
                    None => defaults.audio.volume,
                },
            },
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - The command prefix cannot be empty or contain whitespace
    /// - Radio needs at least one attempt
    /// - The catalog URL must be an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.audio.volume < 0.0 || self.audio.volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.audio.volume);
        }

        if self.command_prefix.is_empty() || self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!("Command prefix cannot be empty or contain spaces: {:?}", self.command_prefix);
        }

        if self.radio_attempts == 0 {
            anyhow::bail!("Radio attempts must be greater than 0");
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("HTTP timeout must be greater than 0");
        }

        let url = url::Url::parse(&self.catalog_url)
            .with_context(|| format!("Invalid catalog URL: {}", self.catalog_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Catalog URL must use http or https, got: {}", url.scheme());
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The bot token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix '{}', announce channel {}, admin role {}\n  \
            Catalog: {} (timeout {}, radio attempts {})\n  \
            Audio: {:?} backend, ffmpeg '{}', {}% vol",
            self.command_prefix,
            self.notify_channel_id.map_or("command channel".to_string(), |id| id.to_string()),
            self.admin_role_id.map_or("none".to_string(), |id| id.to_string()),
            self.catalog_url,
            humantime::format_duration(self.http_timeout),
            self.radio_attempts,
            self.audio.backend,
            self.audio.ffmpeg_path.display(),
            (self.audio.volume * 100.0) as u32,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            command_prefix: "..".to_string(),
            notify_channel_id: None,
            admin_role_id: None,

            catalog_url: "https://juicewrldapi.com".to_string(),
            http_timeout: Duration::from_secs(15),
            radio_attempts: 15,

            audio: AudioSettings {
                backend: AudioBackend::Ffmpeg,
                ffmpeg_path: PathBuf::from("ffmpeg"),
                volume: 0.5,
            },
        }
    }
}
