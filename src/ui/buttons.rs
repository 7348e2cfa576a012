use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones
pub mod button_ids {
    /// Prefijo del botón de letra; el id de la canción va a continuación
    pub const LYRICS_PREFIX: &str = "lyrics:";
}

/// Fila con el botón "Lyrics" para el anuncio de now playing.
///
/// El id lleva el id de la canción, así el click sigue funcionando
/// aunque la canción ya no sea la actual (o el bot se haya reiniciado).
pub fn create_lyrics_button(song_id: u64) -> CreateActionRow {
    let button = CreateButton::new(lyrics_custom_id(song_id))
        .label("Lyrics")
        .style(ButtonStyle::Secondary);

    CreateActionRow::Buttons(vec![button])
}

pub fn lyrics_custom_id(song_id: u64) -> String {
    format!("{}{}", button_ids::LYRICS_PREFIX, song_id)
}

/// Extrae el id de canción de un `custom_id` de botón de letra
pub fn parse_lyrics_custom_id(custom_id: &str) -> Option<u64> {
    custom_id
        .strip_prefix(button_ids::LYRICS_PREFIX)
        .and_then(|id| id.parse().ok())
}
