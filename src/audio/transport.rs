use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{ChildContainer, HttpRequest, Input, RawAdapter},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    path::Path,
    process::{Command, Stdio},
    sync::Arc,
};
use symphonia::core::io::ReadOnlySource;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    audio::session::TrackEvents,
    config::{AudioBackend, AudioSettings},
};

/// Frecuencia y canales que entrega el transcodificador (formato nativo de Discord)
const SAMPLE_RATE: u32 = 48_000;
const CHANNELS: u32 = 2;

/// Identifica cada reproducción iniciada; los eventos de fin con otro token se ignoran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackToken(pub u64);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("failed to launch transcoder: {0}")]
    Transcoder(#[from] std::io::Error),

    #[error("track control failed: {0}")]
    Control(#[from] songbird::error::ControlError),

    #[error("voice connection error: {0}")]
    Join(#[from] songbird::error::JoinError),
}

/// Transporte de voz de una guild
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Reproduce el stream reemplazando lo que sonaba
    async fn play(&self, url: &Url, token: TrackToken) -> Result<(), PlaybackError>;

    fn pause(&self) -> Result<(), PlaybackError>;

    fn resume(&self) -> Result<(), PlaybackError>;

    /// Detiene el track actual (sin desconectar)
    fn stop(&self) -> Result<(), PlaybackError>;

    async fn disconnect(&self) -> Result<(), PlaybackError>;
}

/// Transporte sobre una llamada de songbird
pub struct SongbirdTransport {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    settings: AudioSettings,
    events: TrackEvents,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdTransport {
    pub fn new(
        guild_id: GuildId,
        manager: Arc<Songbird>,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: reqwest::Client,
        settings: AudioSettings,
        events: TrackEvents,
    ) -> Self {
        Self {
            guild_id,
            manager,
            call,
            http,
            settings,
            events,
            current: Mutex::new(None),
        }
    }

    fn create_input(&self, url: &Url) -> Result<Input, PlaybackError> {
        match self.settings.backend {
            AudioBackend::Ffmpeg => spawn_transcoder(&self.settings.ffmpeg_path, url),
            AudioBackend::Direct => {
                // Songbird decodifica con Symphonia, sin proceso externo
                let request = HttpRequest::new(self.http.clone(), url.to_string());
                Ok(Input::from(request))
            }
        }
    }

    fn end_notifier(&self, token: TrackToken) -> TrackEndNotifier {
        TrackEndNotifier {
            guild_id: self.guild_id,
            token,
            events: self.events.clone(),
        }
    }

    fn with_current<F>(&self, action: F) -> Result<(), PlaybackError>
    where
        F: FnOnce(&TrackHandle) -> Result<(), songbird::error::ControlError>,
    {
        match self.current.lock().as_ref() {
            Some(track) => Ok(action(track)?),
            None => Err(PlaybackError::NotConnected),
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn play(&self, url: &Url, token: TrackToken) -> Result<(), PlaybackError> {
        let input = self.create_input(url)?;

        if let Some(previous) = self.current.lock().take() {
            let _ = previous.stop();
        }

        let track = {
            let mut call = self.call.lock().await;
            if call.current_channel().is_none() {
                return Err(PlaybackError::NotConnected);
            }
            call.play_input(input)
        };

        // Registrar event handlers para avanzar la cola
        let registered = track
            .set_volume(self.settings.volume)
            .and_then(|_| track.add_event(Event::Track(TrackEvent::End), self.end_notifier(token)))
            .and_then(|_| track.add_event(Event::Track(TrackEvent::Error), self.end_notifier(token)));

        if let Err(e) = registered {
            let _ = track.stop();
            return Err(e.into());
        }

        debug!("▶️ Track {:?} iniciado en guild {}", token, self.guild_id);
        *self.current.lock() = Some(track);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        self.with_current(|track| track.pause())?;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(())
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        self.with_current(|track| track.play())?;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(())
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        if let Some(track) = self.current.lock().take() {
            track.stop()?;
            info!("⏹️ Track detenido en guild {}", self.guild_id);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlaybackError> {
        self.stop()?;
        self.manager.remove(self.guild_id).await?;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

/// Argumentos de ffmpeg: reconecta el stream HTTP y emite PCM f32 crudo por stdout.
pub fn transcoder_args(url: &Url) -> Vec<String> {
    let sample_rate = SAMPLE_RATE.to_string();
    let channels = CHANNELS.to_string();
    [
        "-reconnect", "1",
        "-reconnect_streamed", "1",
        "-reconnect_delay_max", "5",
        "-i", url.as_str(),
        "-vn",
        "-f", "f32le",
        "-ac", channels.as_str(),
        "-ar", sample_rate.as_str(),
        "-loglevel", "error",
        "pipe:1",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

fn spawn_transcoder(ffmpeg: &Path, url: &Url) -> Result<Input, PlaybackError> {
    let child = Command::new(ffmpeg)
        .args(transcoder_args(url))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            error!("❌ No se pudo lanzar ffmpeg ({}): {}", ffmpeg.display(), e);
            e
        })?;

    let source = ReadOnlySource::new(ChildContainer::from(child));
    let raw = RawAdapter::new(source, SAMPLE_RATE, CHANNELS);
    Ok(Input::from(raw))
}

/// Handler para cuando termina (o falla) un track
struct TrackEndNotifier {
    guild_id: GuildId,
    token: TrackToken,
    events: TrackEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let songbird::tracks::PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Error de reproducción en guild {}: {:?}", self.guild_id, e);
                }
            }
        }

        debug!("Track {:?} terminado en guild {}", self.token, self.guild_id);
        self.events.finished(self.token);
        None
    }
}
