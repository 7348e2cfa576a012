use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::{
    audio::{
        controller::{
            ControlOutcome, EnqueueOutcome, PlaybackController, PlaybackNotifier, RadioOutcome,
            SessionSnapshot,
        },
        transport::{TrackToken, VoiceTransport},
    },
    catalog::{Song, SongCatalog},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("playback session for guild {0} is closed")]
    Closed(GuildId),
}

enum SessionMessage {
    Play {
        song: Song,
        reply: oneshot::Sender<EnqueueOutcome>,
    },
    Skip {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Pause {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Resume {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Radio {
        reply: oneshot::Sender<RadioOutcome>,
    },
    StopRadio {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    Attach {
        transport: Arc<dyn VoiceTransport>,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    TrackFinished {
        token: TrackToken,
    },
}

/// Canal por el que el transporte avisa el fin de cada track
#[derive(Clone)]
pub struct TrackEvents {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl TrackEvents {
    pub fn finished(&self, token: TrackToken) {
        // Si la sesión ya cerró no hay nada que avanzar
        let _ = self.tx.send(SessionMessage::TrackFinished { token });
    }
}

/// Referencia a la sesión de una guild. Todas las mutaciones pasan por una
/// única tarea, así que dos comandos simultáneos nunca ven estados intermedios.
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    /// Lanza la tarea dueña del controlador
    pub fn spawn(controller: PlaybackController, guild_id: GuildId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_session(controller, guild_id, rx));
        Self { guild_id, tx }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn track_events(&self) -> TrackEvents {
        TrackEvents {
            tx: self.tx.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| SessionError::Closed(self.guild_id))?;
        rx.await.map_err(|_| SessionError::Closed(self.guild_id))
    }

    /// Encola y, si no suena nada, arranca la reproducción
    pub async fn play(&self, song: Song) -> Result<EnqueueOutcome, SessionError> {
        self.request(|reply| SessionMessage::Play { song, reply }).await
    }

    pub async fn skip(&self) -> Result<ControlOutcome, SessionError> {
        self.request(|reply| SessionMessage::Skip { reply }).await
    }

    pub async fn pause(&self) -> Result<ControlOutcome, SessionError> {
        self.request(|reply| SessionMessage::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<ControlOutcome, SessionError> {
        self.request(|reply| SessionMessage::Resume { reply }).await
    }

    pub async fn radio(&self) -> Result<RadioOutcome, SessionError> {
        self.request(|reply| SessionMessage::Radio { reply }).await
    }

    pub async fn stop_radio(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionMessage::StopRadio { reply }).await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionMessage::Stop { reply }).await
    }

    /// Detiene, desconecta y cierra la sesión
    pub async fn leave(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionMessage::Leave { reply }).await
    }

    pub async fn attach(&self, transport: Arc<dyn VoiceTransport>) -> Result<(), SessionError> {
        self.request(|reply| SessionMessage::Attach { transport, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionMessage::Snapshot { reply }).await
    }
}

async fn run_session(
    mut controller: PlaybackController,
    guild_id: GuildId,
    mut rx: mpsc::UnboundedReceiver<SessionMessage>,
) {
    info!("🎛️ Sesión de reproducción iniciada para guild {}", guild_id);

    while let Some(message) = rx.recv().await {
        match message {
            SessionMessage::Play { song, reply } => {
                let outcome = controller.enqueue(song);
                let _ = reply.send(outcome);
                if !controller.is_playing() {
                    controller.advance().await;
                }
            }
            SessionMessage::Skip { reply } => {
                let _ = reply.send(controller.skip().await);
            }
            SessionMessage::Pause { reply } => {
                let _ = reply.send(controller.pause());
            }
            SessionMessage::Resume { reply } => {
                let _ = reply.send(controller.resume());
            }
            SessionMessage::Radio { reply } => {
                if controller.is_playing() {
                    let _ = reply.send(controller.enable_radio().await);
                } else {
                    // Responder antes de buscar: la radio puede tardar varios requests
                    let _ = reply.send(RadioOutcome::Started);
                    controller.enable_radio().await;
                }
            }
            SessionMessage::StopRadio { reply } => {
                controller.disable_radio();
                let _ = reply.send(());
            }
            SessionMessage::Stop { reply } => {
                controller.stop();
                let _ = reply.send(());
            }
            SessionMessage::Leave { reply } => {
                // Cerrado antes de responder: quien espera `leave` ya ve la sesión cerrada
                rx.close();
                controller.leave().await;
                let _ = reply.send(());
                break;
            }
            SessionMessage::Attach { transport, reply } => {
                controller.attach(transport).await;
                let _ = reply.send(());
            }
            SessionMessage::Snapshot { reply } => {
                let _ = reply.send(controller.snapshot());
            }
            SessionMessage::TrackFinished { token } => {
                controller.on_track_finished(token).await;
            }
        }
    }

    info!("🛑 Sesión de reproducción cerrada para guild {}", guild_id);
}

/// Sesiones activas por guild. Se crean en el primer uso y se eliminan al salir.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    catalog: Arc<dyn SongCatalog>,
    radio_attempts: u32,
}

impl SessionRegistry {
    pub fn new(catalog: Arc<dyn SongCatalog>, radio_attempts: u32) -> Self {
        Self {
            sessions: DashMap::new(),
            catalog,
            radio_attempts,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild_id)
            .map(|s| s.clone())
            .filter(|s| !s.is_closed())
    }

    /// El notificador solo se construye si la sesión es nueva
    pub fn get_or_create<F>(&self, guild_id: GuildId, notifier: F) -> SessionHandle
    where
        F: FnOnce() -> Arc<dyn PlaybackNotifier>,
    {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    debug!("Reemplazando sesión cerrada de guild {}", guild_id);
                    let handle = self.spawn_session(guild_id, notifier());
                    occupied.insert(handle.clone());
                    handle
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                let handle = self.spawn_session(guild_id, notifier());
                vacant.insert(handle.clone());
                handle
            }
        }
    }

    /// Quita la sesión del registro; quien llama decide si enviarle `leave`
    pub fn remove(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.remove(&guild_id).map(|(_, handle)| handle)
    }

    /// Sesiones vivas; las cerradas siguen en el mapa hasta que se reemplazan
    pub fn len(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .count()
    }

    /// Vacía el registro (reinicio del proceso)
    pub fn drain(&self) -> Vec<SessionHandle> {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        guilds
            .into_iter()
            .filter_map(|guild_id| self.remove(guild_id))
            .collect()
    }

    fn spawn_session(&self, guild_id: GuildId, notifier: Arc<dyn PlaybackNotifier>) -> SessionHandle {
        let controller = PlaybackController::new(
            guild_id,
            self.catalog.clone(),
            notifier,
            self.radio_attempts,
        );
        SessionHandle::spawn(controller, guild_id)
    }
}
