use async_trait::async_trait;
use serenity::{all::ChannelId, builder::CreateMessage, http::Http};
use std::sync::Arc;
use tracing::warn;

use crate::{
    audio::controller::{PlaybackNotice, PlaybackNotifier},
    ui::{buttons, embeds},
};

/// Publica los avisos del reproductor en un canal de texto
pub struct DiscordNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

/// Mensaje de Discord para cada aviso
pub fn notice_message(notice: &PlaybackNotice) -> CreateMessage {
    match notice {
        PlaybackNotice::NowPlaying(song) => {
            let message = CreateMessage::new().content(embeds::now_playing_announcement(song));
            if song.has_lyrics() {
                message.components(vec![buttons::create_lyrics_button(song.id)])
            } else {
                message
            }
        }
        PlaybackNotice::QueueFinished => CreateMessage::new().content("Queue finished."),
        PlaybackNotice::RadioFailed => {
            CreateMessage::new().content("Failed to fetch radio song. Radio stopping.")
        }
    }
}

#[async_trait]
impl PlaybackNotifier for DiscordNotifier {
    async fn notify(&self, notice: PlaybackNotice) {
        if let Err(e) = self
            .channel_id
            .send_message(&self.http, notice_message(&notice))
            .await
        {
            warn!("No se pudo enviar aviso al canal {}: {:?}", self.channel_id, e);
        }
    }
}
