use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::SongQueue,
        transport::{PlaybackError, TrackToken, VoiceTransport},
    },
    catalog::{CatalogError, Song, SongCatalog},
};

/// Avisos que el reproductor publica en el canal de anuncios
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackNotice {
    NowPlaying(Song),
    QueueFinished,
    RadioFailed,
}

#[async_trait]
pub trait PlaybackNotifier: Send + Sync {
    async fn notify(&self, notice: PlaybackNotice);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub current: Option<Song>,
    pub current_token: Option<TrackToken>,
    pub is_playing: bool,
    pub is_paused: bool,
    pub radio_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    /// Posición en la cola cuando ya hay algo sonando
    pub position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Done,
    NothingPlaying,
    NothingPaused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOutcome {
    Started,
    AfterCurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Playing,
    Idle,
}

/// Copia del estado para listados y el panel de debug
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub current: Option<Song>,
    pub queue: Vec<Song>,
    pub is_playing: bool,
    pub is_paused: bool,
    pub radio_mode: bool,
    pub connected: bool,
}

#[derive(Debug, Error)]
enum StartError {
    #[error("song has no audio path")]
    MissingPath,

    #[error("could not resolve audio path: {0}")]
    Resolve(#[from] CatalogError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Máquina de estados de reproducción de una guild.
///
/// Estados: Idle, Playing y Paused. `advance` es la única transición que elige
/// la siguiente canción; se llama al terminar un track o al saltar.
pub struct PlaybackController {
    guild_id: GuildId,
    catalog: Arc<dyn SongCatalog>,
    notifier: Arc<dyn PlaybackNotifier>,
    transport: Option<Arc<dyn VoiceTransport>>,
    queue: SongQueue,
    state: PlaybackState,
    radio_attempts: u32,
    next_token: u64,
}

impl PlaybackController {
    pub fn new(
        guild_id: GuildId,
        catalog: Arc<dyn SongCatalog>,
        notifier: Arc<dyn PlaybackNotifier>,
        radio_attempts: u32,
    ) -> Self {
        Self {
            guild_id,
            catalog,
            notifier,
            transport: None,
            queue: SongQueue::new(),
            state: PlaybackState::default(),
            radio_attempts,
            next_token: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    /// Engancha el transporte de voz.
    ///
    /// Si reemplaza a otro, el track del transporte viejo se corta y la canción
    /// actual vuelve a empezar en el nuevo, así nunca quedan dos tracks sonando.
    pub async fn attach(&mut self, transport: Arc<dyn VoiceTransport>) {
        let previous = self.transport.replace(transport.clone());
        info!("🔊 Transporte de voz conectado en guild {}", self.guild_id);

        let Some(previous) = previous else {
            return;
        };
        if Arc::ptr_eq(&previous, &transport) {
            return;
        }
        if let Err(e) = previous.stop() {
            warn!("Error al detener track del transporte anterior en guild {}: {}", self.guild_id, e);
        }

        let Some(song) = self.state.current.clone() else {
            return;
        };
        match self.start(&song).await {
            Ok(token) => {
                debug!("🔁 {} reanudado en el nuevo transporte de guild {}", song.display_name(), self.guild_id);
                self.state.current_token = Some(token);
                self.state.is_paused = false;
            }
            Err(e) => {
                warn!("No se pudo retomar {} en guild {}: {}", song.display_name(), self.guild_id, e);
                self.advance().await;
            }
        }
    }

    /// Agrega a la cola. Encolar explícitamente siempre apaga la radio.
    pub fn enqueue(&mut self, song: Song) -> EnqueueOutcome {
        if self.state.radio_mode {
            info!("📻 Radio desactivada por canción encolada en guild {}", self.guild_id);
        }
        self.state.radio_mode = false;

        let position = self.queue.push(song);
        EnqueueOutcome {
            position: self.state.is_playing.then_some(position),
        }
    }

    /// Pasa a la siguiente canción, a la radio o a Idle.
    ///
    /// Las canciones sin path o que el transporte no puede iniciar se saltan sin
    /// cortar la sesión; el bucle termina porque cada vuelta consume la cola.
    pub async fn advance(&mut self) -> Advance {
        loop {
            let (song, from_radio) = match self.queue.pop() {
                Some(song) => (song, false),
                None if self.state.radio_mode => {
                    match self.catalog.fetch_random_valid(self.radio_attempts).await {
                        Ok(song) => (song, true),
                        Err(e) => {
                            warn!("📻 Radio sin canción en guild {}: {}", self.guild_id, e);
                            return self.radio_failed().await;
                        }
                    }
                }
                None => return self.go_idle().await,
            };

            if song.audio_path().is_none() {
                warn!("⏭️ Saltando {} en guild {}: {}", song.display_name(), self.guild_id, StartError::MissingPath);
                if from_radio {
                    return self.radio_failed().await;
                }
                continue;
            }

            if self.transport.is_none() {
                debug!("Sin conexión de voz en guild {}, cola detenida", self.guild_id);
                self.clear_current();
                return Advance::Idle;
            }

            match self.start(&song).await {
                Ok(token) => {
                    info!("🎵 Reproduciendo: {} en guild {}", song.display_name(), self.guild_id);
                    self.state.current = Some(song.clone());
                    self.state.current_token = Some(token);
                    self.state.is_playing = true;
                    self.state.is_paused = false;
                    self.notifier.notify(PlaybackNotice::NowPlaying(song)).await;
                    return Advance::Playing;
                }
                Err(e) => {
                    warn!("⏭️ Saltando {} en guild {}: {}", song.display_name(), self.guild_id, e);
                    if from_radio {
                        return self.radio_failed().await;
                    }
                }
            }
        }
    }

    /// Evento de fin de track; los tokens viejos (skip, stop) se ignoran.
    pub async fn on_track_finished(&mut self, token: TrackToken) -> Option<Advance> {
        if self.state.current_token != Some(token) {
            debug!("Evento de fin obsoleto {:?} en guild {}", token, self.guild_id);
            return None;
        }
        Some(self.advance().await)
    }

    pub async fn skip(&mut self) -> ControlOutcome {
        if !self.state.is_playing {
            return ControlOutcome::NothingPlaying;
        }

        if let Some(transport) = &self.transport {
            if let Err(e) = transport.stop() {
                warn!("Error al detener track en guild {}: {}", self.guild_id, e);
            }
        }
        self.advance().await;
        ControlOutcome::Done
    }

    pub fn pause(&mut self) -> ControlOutcome {
        if !self.state.is_playing || self.state.is_paused {
            return ControlOutcome::NothingPlaying;
        }
        let Some(transport) = &self.transport else {
            return ControlOutcome::NothingPlaying;
        };

        if let Err(e) = transport.pause() {
            warn!("Error al pausar en guild {}: {}", self.guild_id, e);
            return ControlOutcome::NothingPlaying;
        }
        self.state.is_paused = true;
        ControlOutcome::Done
    }

    pub fn resume(&mut self) -> ControlOutcome {
        if !self.state.is_paused {
            return ControlOutcome::NothingPaused;
        }
        let Some(transport) = &self.transport else {
            return ControlOutcome::NothingPaused;
        };

        if let Err(e) = transport.resume() {
            warn!("Error al reanudar en guild {}: {}", self.guild_id, e);
            return ControlOutcome::NothingPaused;
        }
        self.state.is_paused = false;
        ControlOutcome::Done
    }

    /// Activa la radio; si no suena nada arranca ya.
    pub async fn enable_radio(&mut self) -> RadioOutcome {
        self.state.radio_mode = true;
        info!("📻 Radio activada en guild {}", self.guild_id);

        if self.state.is_playing {
            RadioOutcome::AfterCurrent
        } else {
            self.advance().await;
            RadioOutcome::Started
        }
    }

    pub fn disable_radio(&mut self) {
        self.state.radio_mode = false;
        info!("📻 Radio desactivada en guild {}", self.guild_id);
    }

    /// Limpia cola y flags y detiene el transporte
    pub fn stop(&mut self) {
        self.queue.clear();
        self.state = PlaybackState::default();

        if let Some(transport) = &self.transport {
            if let Err(e) = transport.stop() {
                warn!("Error al detener reproducción en guild {}: {}", self.guild_id, e);
            }
        }
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    /// `stop` más desconexión del canal de voz
    pub async fn leave(&mut self) {
        self.stop();
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.disconnect().await {
                debug!("Desconexión en guild {}: {}", self.guild_id, e);
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current: self.state.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            is_playing: self.state.is_playing,
            is_paused: self.state.is_paused,
            radio_mode: self.state.radio_mode,
            connected: self.transport.is_some(),
        }
    }

    async fn start(&mut self, song: &Song) -> Result<TrackToken, StartError> {
        let path = song.audio_path().ok_or(StartError::MissingPath)?;
        let url = self.catalog.stream_url(path)?;
        let transport = self
            .transport
            .clone()
            .ok_or(StartError::Playback(PlaybackError::NotConnected))?;

        self.next_token += 1;
        let token = TrackToken(self.next_token);
        transport.play(&url, token).await?;
        Ok(token)
    }

    async fn radio_failed(&mut self) -> Advance {
        self.state.radio_mode = false;
        self.notifier.notify(PlaybackNotice::RadioFailed).await;
        self.go_idle().await
    }

    /// Solo avisa "cola terminada" si realmente había algo sonando.
    async fn go_idle(&mut self) -> Advance {
        let was_active = self.state.is_playing || self.state.current.is_some();
        self.clear_current();

        if was_active {
            info!("📭 Cola terminada en guild {}", self.guild_id);
            self.notifier.notify(PlaybackNotice::QueueFinished).await;
        }
        Advance::Idle
    }

    fn clear_current(&mut self) {
        self.state.current = None;
        self.state.current_token = None;
        self.state.is_playing = false;
        self.state.is_paused = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{test_song, MockSongCatalog};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use url::Url;

    /// Transporte falso que registra lo que se le pide
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub played: Mutex<Vec<(String, TrackToken)>>,
        pub fail_paths: Vec<String>,
        pub stops: Mutex<u32>,
        pub paused: Mutex<bool>,
        pub disconnected: Mutex<bool>,
    }

    #[async_trait]
    impl VoiceTransport for RecordingTransport {
        async fn play(&self, url: &Url, token: TrackToken) -> Result<(), PlaybackError> {
            if self.fail_paths.iter().any(|p| url.as_str().contains(p.as_str())) {
                return Err(PlaybackError::Transcoder(std::io::Error::other("ffmpeg missing")));
            }
            self.played.lock().push((url.to_string(), token));
            Ok(())
        }

        fn pause(&self) -> Result<(), PlaybackError> {
            *self.paused.lock() = true;
            Ok(())
        }

        fn resume(&self) -> Result<(), PlaybackError> {
            *self.paused.lock() = false;
            Ok(())
        }

        fn stop(&self) -> Result<(), PlaybackError> {
            *self.stops.lock() += 1;
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), PlaybackError> {
            *self.disconnected.lock() = true;
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub notices: Mutex<Vec<PlaybackNotice>>,
    }

    #[async_trait]
    impl PlaybackNotifier for RecordingNotifier {
        async fn notify(&self, notice: PlaybackNotice) {
            self.notices.lock().push(notice);
        }
    }

    pub(crate) fn catalog_with_urls() -> MockSongCatalog {
        let mut catalog = MockSongCatalog::new();
        catalog
            .expect_stream_url()
            .returning(|path| Ok(Url::parse(&format!("https://catalog.test/dl?path={path}")).unwrap()));
        catalog
    }

    fn controller(
        catalog: MockSongCatalog,
        transport: Arc<RecordingTransport>,
    ) -> (PlaybackController, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut controller =
            PlaybackController::new(GuildId::new(1), Arc::new(catalog), notifier.clone(), 15);
        controller.transport = Some(transport);
        (controller, notifier)
    }

    fn queued_ids(controller: &PlaybackController) -> Vec<u64> {
        controller.queue.iter().map(|s| s.id).collect()
    }

    fn current_id(controller: &PlaybackController) -> Option<u64> {
        controller.state.current.as_ref().map(|s| s.id)
    }

    #[tokio::test]
    async fn test_queue_drains_in_order_on_track_finish() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, notifier) = controller(catalog_with_urls(), transport.clone());

        player.enqueue(test_song(1, "A"));
        assert_eq!(player.advance().await, Advance::Playing);
        player.enqueue(test_song(2, "B"));
        player.enqueue(test_song(3, "C"));
        assert_eq!(current_id(&player), Some(1));
        assert_eq!(queued_ids(&player), vec![2, 3]);

        let token = player.state.current_token.unwrap();
        player.on_track_finished(token).await;
        assert_eq!(current_id(&player), Some(2));
        assert_eq!(queued_ids(&player), vec![3]);

        let token = player.state.current_token.unwrap();
        player.on_track_finished(token).await;
        assert_eq!(current_id(&player), Some(3));
        assert!(player.queue.is_empty());

        let token = player.state.current_token.unwrap();
        assert_eq!(player.on_track_finished(token).await, Some(Advance::Idle));
        assert_eq!(current_id(&player), None);
        assert!(!player.is_playing());

        assert_eq!(transport.played.lock().len(), 3);
        assert_eq!(notifier.notices.lock().last(), Some(&PlaybackNotice::QueueFinished));
    }

    #[tokio::test]
    async fn test_enqueue_clears_radio_and_reports_position() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog_with_urls(), transport);

        player.state.radio_mode = true;
        let outcome = player.enqueue(test_song(1, "A"));
        assert!(!player.state.radio_mode);
        assert_eq!(outcome.position, None);

        player.advance().await;
        player.enqueue(test_song(2, "B"));
        let outcome = player.enqueue(test_song(3, "C"));
        assert_eq!(outcome.position, Some(2));
    }

    #[tokio::test]
    async fn test_advance_on_empty_queue_is_idempotent() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, notifier) = controller(catalog_with_urls(), transport);

        player.enqueue(test_song(1, "A"));
        player.advance().await;
        assert_eq!(player.advance().await, Advance::Idle);
        let after_first = player.state.clone();
        let notices = notifier.notices.lock().len();

        assert_eq!(player.advance().await, Advance::Idle);
        assert_eq!(player.state, after_first);
        assert_eq!(after_first.current, None);
        assert!(!after_first.is_playing);
        assert_eq!(notifier.notices.lock().len(), notices);
    }

    #[tokio::test]
    async fn test_song_without_path_is_skipped() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, notifier) = controller(catalog_with_urls(), transport.clone());

        let mut broken = test_song(1, "Broken");
        broken.path = None;
        player.enqueue(broken);
        player.enqueue(test_song(2, "Good"));

        assert_eq!(player.advance().await, Advance::Playing);
        assert_eq!(current_id(&player), Some(2));
        assert_eq!(transport.played.lock().len(), 1);
        assert_eq!(
            *notifier.notices.lock(),
            vec![PlaybackNotice::NowPlaying(test_song(2, "Good"))]
        );
    }

    #[tokio::test]
    async fn test_pathless_song_skipped_before_voice_check() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut player = PlaybackController::new(
            GuildId::new(1),
            Arc::new(catalog_with_urls()),
            notifier.clone(),
            15,
        );

        let mut broken = test_song(1, "Broken");
        broken.path = None;
        player.enqueue(broken);
        player.enqueue(test_song(2, "Good"));
        player.enqueue(test_song(3, "Later"));

        assert_eq!(player.advance().await, Advance::Idle);
        assert_eq!(queued_ids(&player), vec![3]);
        assert!(notifier.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_skips_to_next() {
        let transport = Arc::new(RecordingTransport {
            fail_paths: vec!["Bad".to_string()],
            ..Default::default()
        });
        let (mut player, _) = controller(catalog_with_urls(), transport);

        player.enqueue(test_song(1, "Bad"));
        player.enqueue(test_song(2, "Bad"));
        player.enqueue(test_song(3, "Fine"));

        assert_eq!(player.advance().await, Advance::Playing);
        assert_eq!(current_id(&player), Some(3));
    }

    #[tokio::test]
    async fn test_radio_fills_empty_queue() {
        let mut catalog = catalog_with_urls();
        catalog
            .expect_fetch_random_valid()
            .withf(|attempts| *attempts == 15)
            .times(1)
            .returning(|_| Ok(test_song(77, "Radio pick")));
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog, transport);

        assert_eq!(player.enable_radio().await, RadioOutcome::Started);
        assert_eq!(current_id(&player), Some(77));
        assert!(player.is_playing());
        assert!(player.state.radio_mode);
    }

    #[tokio::test]
    async fn test_radio_waits_for_explicit_entries() {
        let mut catalog = catalog_with_urls();
        catalog.expect_fetch_random_valid().never();
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog, transport);

        player.enqueue(test_song(1, "A"));
        player.enqueue(test_song(2, "B"));
        player.advance().await;

        assert_eq!(player.enable_radio().await, RadioOutcome::AfterCurrent);
        let token = player.state.current_token.unwrap();
        player.on_track_finished(token).await;
        assert_eq!(current_id(&player), Some(2));
    }

    #[tokio::test]
    async fn test_radio_exhaustion_disables_radio() {
        let mut catalog = catalog_with_urls();
        catalog
            .expect_fetch_random_valid()
            .times(1)
            .returning(|attempts| Err(CatalogError::RadioExhausted { attempts }));
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, notifier) = controller(catalog, transport);

        assert_eq!(player.enable_radio().await, RadioOutcome::Started);
        assert!(!player.state.radio_mode);
        assert!(!player.is_playing());
        assert_eq!(*notifier.notices.lock(), vec![PlaybackNotice::RadioFailed]);
    }

    #[tokio::test]
    async fn test_pause_and_resume_guards() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog_with_urls(), transport.clone());

        assert_eq!(player.pause(), ControlOutcome::NothingPlaying);
        assert_eq!(player.resume(), ControlOutcome::NothingPaused);
        assert_eq!(player.state, PlaybackState::default());

        player.enqueue(test_song(1, "A"));
        player.advance().await;
        assert_eq!(player.pause(), ControlOutcome::Done);
        assert!(player.state.is_paused && player.is_playing());
        assert!(*transport.paused.lock());
        assert_eq!(player.pause(), ControlOutcome::NothingPlaying);

        assert_eq!(player.resume(), ControlOutcome::Done);
        assert!(!player.state.is_paused);
    }

    #[tokio::test]
    async fn test_stale_finish_after_skip_is_ignored() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog_with_urls(), transport.clone());

        player.enqueue(test_song(1, "A"));
        player.enqueue(test_song(2, "B"));
        player.enqueue(test_song(3, "C"));
        player.advance().await;
        let first = player.state.current_token.unwrap();

        assert_eq!(player.skip().await, ControlOutcome::Done);
        assert_eq!(current_id(&player), Some(2));
        assert_eq!(player.on_track_finished(first).await, None);
        assert_eq!(current_id(&player), Some(2));
        assert_eq!(*transport.stops.lock(), 1);
    }

    #[tokio::test]
    async fn test_reattach_moves_current_track_to_new_transport() {
        let first = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog_with_urls(), first.clone());

        player.enqueue(test_song(1, "A"));
        player.enqueue(test_song(2, "B"));
        player.advance().await;
        let old_token = player.state.current_token.unwrap();

        let second = Arc::new(RecordingTransport::default());
        player.attach(second.clone()).await;
        assert_eq!(*first.stops.lock(), 1);
        assert_eq!(second.played.lock().len(), 1);
        assert_eq!(current_id(&player), Some(1));
        assert_eq!(player.on_track_finished(old_token).await, None);

        // El mismo transporte otra vez no corta nada
        player.attach(second.clone()).await;
        assert_eq!(*second.stops.lock(), 0);

        assert_eq!(player.skip().await, ControlOutcome::Done);
        assert_eq!(*second.stops.lock(), 1);
        assert_eq!(current_id(&player), Some(2));
        assert_eq!(first.played.lock().len(), 1);
        assert_eq!(second.played.lock().len(), 2);

        player.stop();
        assert_eq!(*second.stops.lock(), 2);
        assert_eq!(*first.stops.lock(), 1);
    }

    #[tokio::test]
    async fn test_attach_while_idle_plays_nothing() {
        let first = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog_with_urls(), first.clone());

        let second = Arc::new(RecordingTransport::default());
        player.attach(second.clone()).await;
        assert!(second.played.lock().is_empty());
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_stop_resets_everything() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut player, _) = controller(catalog_with_urls(), transport.clone());

        player.enqueue(test_song(1, "A"));
        player.enqueue(test_song(2, "B"));
        player.advance().await;
        player.pause();
        player.state.radio_mode = true;

        player.stop();
        assert_eq!(player.state, PlaybackState::default());
        assert!(player.queue.is_empty());
        assert!(player.snapshot().connected);

        player.leave().await;
        assert!(*transport.disconnected.lock());
        assert!(!player.snapshot().connected);
    }

    #[tokio::test]
    async fn test_without_voice_connection_goes_idle() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut player = PlaybackController::new(
            GuildId::new(1),
            Arc::new(catalog_with_urls()),
            notifier.clone(),
            15,
        );

        player.enqueue(test_song(1, "A"));
        assert_eq!(player.advance().await, Advance::Idle);
        assert_eq!(current_id(&player), None);
        assert!(notifier.notices.lock().is_empty());
    }
}
