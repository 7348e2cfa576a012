use reqwest::StatusCode;
use thiserror::Error;

/// Errores de consulta al catálogo.
///
/// Separa "no hay resultados" de fallos de red y de respuestas mal formadas,
/// para que quien llama pueda decidir qué mostrar al usuario.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("song not found")]
    NotFound,

    #[error("no results for the query")]
    NoResults,

    #[error("catalog answered with status {0}")]
    Status(StatusCode),

    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed catalog response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("catalog listing has no usable song count")]
    InvalidCount,

    #[error("no playable song found after {attempts} attempts")]
    RadioExhausted { attempts: u32 },

    #[error("invalid catalog url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl CatalogError {
    /// True cuando el catálogo respondió correctamente pero no hay canción.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, CatalogError::NotFound | CatalogError::NoResults)
    }
}
