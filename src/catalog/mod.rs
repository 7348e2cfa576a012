//! # Catalog Module
//!
//! Song records and lookups against the remote song catalog.
//!
//! - [`Song`]: a catalog entry as returned by the songs endpoints
//! - [`SongCatalog`]: the lookups the player needs (by id, by search, random pick)
//! - [`client::CatalogClient`]: the HTTP implementation over `reqwest`
//!
//! Lookups return [`CatalogError`] instead of swallowing failures, so callers can
//! tell "no results" apart from a network error or a malformed payload.

pub mod client;
pub mod error;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;
use url::Url;

pub use client::CatalogClient;
pub use error::CatalogError;

/// Lookups contra el catálogo de canciones
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SongCatalog: Send + Sync {
    /// Obtiene el detalle completo de una canción (incluye `path`)
    async fn fetch_by_id(&self, id: u64) -> Result<Song, CatalogError>;

    /// Busca y devuelve el primer resultado
    async fn search(&self, query: &str) -> Result<Song, CatalogError>;

    /// Elige una canción aleatoria reproducible para el modo radio
    async fn fetch_random_valid(&self, max_attempts: u32) -> Result<Song, CatalogError>;

    /// Resuelve el `path` de audio a la URL de descarga
    fn stream_url(&self, path: &str) -> Result<Url, CatalogError>;
}

/// Categoría de una canción en el catálogo
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Category {
    Released,
    Unreleased,
    Other(String),
}

impl Category {
    /// Solo lo publicado y lo inédito se puede reproducir
    pub fn is_playable(&self) -> bool {
        matches!(self, Category::Released | Category::Unreleased)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::Released => "released",
            Category::Unreleased => "unreleased",
            Category::Other(other) => other,
        }
    }

    /// Nombre con mayúscula inicial, como se muestra en los embeds
    pub fn title(&self) -> String {
        let raw = self.as_str();
        if raw.is_empty() {
            return "Unknown".to_string();
        }
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other(String::new())
    }
}

impl From<Option<String>> for Category {
    fn from(value: Option<String>) -> Self {
        let value = value.unwrap_or_default();
        match value.trim().to_lowercase().as_str() {
            "released" => Category::Released,
            "unreleased" => Category::Unreleased,
            _ => Category::Other(value),
        }
    }
}

/// Una entrada del catálogo. Inmutable una vez obtenida; la identidad es `id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Song {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient_text")]
    pub length: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub producers: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub engineers: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub credited_artists: Option<String>,
    #[serde(default)]
    pub era: Option<serde_json::Value>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    /// Solo presente en el detalle completo (`/songs/{id}/`)
    #[serde(default)]
    pub path: Option<String>,
}

impl Song {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }

    pub fn era_name(&self) -> Option<&str> {
        self.era
            .as_ref()
            .and_then(|era| era.get("name"))
            .and_then(|name| name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Path de audio utilizable, si existe
    pub fn audio_path(&self) -> Option<&str> {
        self.path.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    pub fn has_lyrics(&self) -> bool {
        self.lyrics.as_deref().is_some_and(|l| !l.trim().is_empty())
    }

    /// Criterio de aceptación del modo radio
    pub fn is_radio_candidate(&self) -> bool {
        self.audio_path().is_some() && self.category.is_playable()
    }
}

/// Acepta texto, números o listas donde el catálogo no es consistente.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }))
}

/// Página de resultados de `/songs/`
#[derive(Debug, Deserialize)]
pub struct SongPage {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub results: Vec<Song>,
}

/// Cómo resolver lo que escribió el usuario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongQuery {
    Id(u64),
    Search(String),
}

impl SongQuery {
    /// Un link del catálogo (`.../songs/25/`) se resuelve por id; el resto es búsqueda.
    pub fn parse(query: &str) -> Self {
        static SONG_LINK: OnceLock<Option<Regex>> = OnceLock::new();
        let re = SONG_LINK.get_or_init(|| Regex::new(r"/songs/(\d+)").ok());

        re.as_ref()
            .and_then(|re| re.captures(query))
            .and_then(|caps| caps.get(1))
            .and_then(|id| id.as_str().parse().ok())
            .map(SongQuery::Id)
            .unwrap_or_else(|| SongQuery::Search(query.trim().to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_song(id: u64, name: &str) -> Song {
    Song {
        id,
        name: name.to_string(),
        category: Category::Released,
        length: Some("3:00".to_string()),
        producers: None,
        engineers: None,
        credited_artists: None,
        era: None,
        image_url: None,
        lyrics: None,
        path: Some(format!("Compilation/{name}.mp3")),
    }
}
