use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::{future::Future, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

use super::{CatalogError, Song, SongCatalog, SongPage};

const API_PREFIX: &str = "juicewrld/";

/// Cliente HTTP del catálogo de canciones
pub struct CatalogClient {
    client: reqwest::Client,
    origin: Url,
    api: Url,
}

impl CatalogClient {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wrld-player/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Self::with_client(client, origin)
    }

    pub fn with_client(client: reqwest::Client, origin: &str) -> Result<Self, CatalogError> {
        // Url::join descarta el último segmento si no termina en '/'
        let origin = if origin.ends_with('/') {
            Url::parse(origin)?
        } else {
            Url::parse(&format!("{}/", origin))?
        };
        let api = origin.join(API_PREFIX)?;

        Ok(Self {
            client,
            origin,
            api,
        })
    }

    pub fn song_url(&self, id: u64) -> Result<Url, CatalogError> {
        Ok(self.api.join(&format!("songs/{}/", id))?)
    }

    pub fn search_url(&self, query: &str) -> Result<Url, CatalogError> {
        let mut url = self.listing_url()?;
        url.query_pairs_mut().append_pair("search", query);
        Ok(url)
    }

    pub fn listing_url(&self) -> Result<Url, CatalogError> {
        Ok(self.api.join("songs/")?)
    }

    /// URL de descarga que consume el transcodificador
    pub fn download_url(&self, path: &str) -> Result<Url, CatalogError> {
        let base = self.api.join("files/download/")?;
        Ok(Url::parse(&format!(
            "{}?path={}",
            base,
            urlencoding::encode(path)
        ))?)
    }

    /// Las portadas vienen como rutas relativas al origen
    pub fn image_url(&self, relative: &str) -> Option<String> {
        let relative = relative.trim();
        if relative.is_empty() {
            return None;
        }
        if relative.starts_with("http://") || relative.starts_with("https://") {
            return Some(relative.to_string());
        }
        self.origin
            .join(relative.trim_start_matches('/'))
            .ok()
            .map(String::from)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        debug!("🌐 GET {}", url);
        let response = self.client.get(url).send().await?;

        check_status(response.status())?;

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Total de canciones según el listado paginado
    async fn song_count(&self) -> Result<u64, CatalogError> {
        let page: SongPage = self.get_json(self.listing_url()?).await?;
        usable_count(&page)
    }
}

#[async_trait]
impl SongCatalog for CatalogClient {
    async fn fetch_by_id(&self, id: u64) -> Result<Song, CatalogError> {
        self.get_json(self.song_url(id)?).await
    }

    async fn search(&self, query: &str) -> Result<Song, CatalogError> {
        info!("🔍 Buscando en el catálogo: {}", query);
        let page: SongPage = self.get_json(self.search_url(query)?).await?;
        first_result(page)
    }

    async fn fetch_random_valid(&self, max_attempts: u32) -> Result<Song, CatalogError> {
        let count = self.song_count().await?;
        let ids = draw_candidate_ids(count, max_attempts, &mut rand::thread_rng());
        debug!("📻 Candidatos de radio: {:?}", ids);

        try_candidates(&ids, |id| self.fetch_by_id(id)).await
    }

    fn stream_url(&self, path: &str) -> Result<Url, CatalogError> {
        self.download_url(path)
    }
}

/// 404 es "no existe"; cualquier otro estado fuera de 2xx es un error del catálogo.
pub(crate) fn check_status(status: StatusCode) -> Result<(), CatalogError> {
    if status == StatusCode::NOT_FOUND {
        return Err(CatalogError::NotFound);
    }
    if !status.is_success() {
        return Err(CatalogError::Status(status));
    }
    Ok(())
}

/// Total del listado; sin `count` o con cero no se puede sortear radio.
pub(crate) fn usable_count(page: &SongPage) -> Result<u64, CatalogError> {
    match page.count {
        Some(count) if count > 0 => Ok(count),
        _ => Err(CatalogError::InvalidCount),
    }
}

pub(crate) fn first_result(page: SongPage) -> Result<Song, CatalogError> {
    page.results.into_iter().next().ok_or(CatalogError::NoResults)
}

/// Ids distintos y uniformes en `[1, count]`, como máximo `max_attempts`.
pub(crate) fn draw_candidate_ids<R: Rng + ?Sized>(
    count: u64,
    max_attempts: u32,
    rng: &mut R,
) -> Vec<u64> {
    let amount = (max_attempts as u64).min(count) as usize;
    rand::seq::index::sample(rng, count as usize, amount)
        .into_iter()
        .map(|index| index as u64 + 1)
        .collect()
}

/// Prueba cada candidato en orden y devuelve el primero apto para la radio.
pub(crate) async fn try_candidates<F, Fut>(ids: &[u64], mut fetch: F) -> Result<Song, CatalogError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Song, CatalogError>>,
{
    for &id in ids {
        match fetch(id).await {
            Ok(song) if song.is_radio_candidate() => {
                info!("📻 Radio eligió: {} (#{})", song.display_name(), id);
                return Ok(song);
            }
            Ok(song) => {
                debug!("📻 Descartado #{} ({}): sin path o categoría no válida", id, song.display_name());
            }
            Err(e) => {
                debug!("📻 Candidato #{} falló: {}", id, e);
            }
        }
    }

    warn!("📻 Ningún candidato válido tras {} intentos", ids.len());
    Err(CatalogError::RadioExhausted {
        attempts: ids.len() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{test_song, Category};
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use std::{cell::RefCell, collections::HashSet};

    fn client() -> CatalogClient {
        CatalogClient::with_client(reqwest::Client::new(), "https://juicewrldapi.com").unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let catalog = client();
        assert_eq!(
            catalog.song_url(25).unwrap().as_str(),
            "https://juicewrldapi.com/juicewrld/songs/25/"
        );
        assert_eq!(
            catalog.search_url("lucid dreams").unwrap().as_str(),
            "https://juicewrldapi.com/juicewrld/songs/?search=lucid+dreams"
        );
        assert_eq!(
            catalog.download_url("Released/Lucid Dreams.mp3").unwrap().as_str(),
            "https://juicewrldapi.com/juicewrld/files/download/?path=Released%2FLucid%20Dreams.mp3"
        );
    }

    #[test]
    fn test_image_url_is_rooted_at_origin() {
        let catalog = client();
        assert_eq!(
            catalog.image_url("/media/covers/gbgr.jpg").as_deref(),
            Some("https://juicewrldapi.com/media/covers/gbgr.jpg")
        );
        assert_eq!(catalog.image_url(""), None);
    }

    #[test]
    fn test_candidate_ids_are_distinct_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let ids = draw_candidate_ids(500, 15, &mut rng);

        assert_eq!(ids.len(), 15);
        assert!(ids.iter().all(|id| (1..=500).contains(id)));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 15);
    }

    #[test]
    fn test_candidate_ids_capped_by_catalog_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ids = draw_candidate_ids(3, 15, &mut rng);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(matches!(check_status(StatusCode::NOT_FOUND), Err(CatalogError::NotFound)));
        assert!(matches!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(CatalogError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(CatalogError::Status(StatusCode::TOO_MANY_REQUESTS))
        ));
        assert!(check_status(StatusCode::NOT_FOUND).unwrap_err().is_empty_result());
        assert!(!check_status(StatusCode::BAD_GATEWAY).unwrap_err().is_empty_result());
    }

    #[test]
    fn test_listing_count_must_be_positive() {
        let page: SongPage = serde_json::from_str(r#"{"count": 2400, "results": []}"#).unwrap();
        assert_eq!(usable_count(&page).unwrap(), 2400);

        let page: SongPage = serde_json::from_str(r#"{"count": 0, "results": []}"#).unwrap();
        assert!(matches!(usable_count(&page), Err(CatalogError::InvalidCount)));

        let page: SongPage = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(matches!(usable_count(&page), Err(CatalogError::InvalidCount)));
    }

    #[test]
    fn test_search_takes_first_result() {
        let page = SongPage {
            count: Some(2),
            results: vec![test_song(5, "Lucid Dreams"), test_song(6, "Lucid Dreams (Remix)")],
        };
        assert_eq!(first_result(page).unwrap().id, 5);

        let empty: SongPage = serde_json::from_str(r#"{"count": 0, "results": []}"#).unwrap();
        let err = first_result(empty).unwrap_err();
        assert!(matches!(err, CatalogError::NoResults));
        assert!(err.is_empty_result());
    }

    #[tokio::test]
    async fn test_third_candidate_is_accepted() {
        let calls = RefCell::new(Vec::new());
        let result = try_candidates(&[10, 20, 30, 40], |id| {
            calls.borrow_mut().push(id);
            let outcome = match id {
                10 => Err(CatalogError::NotFound),
                20 => {
                    let mut song = test_song(id, "no path");
                    song.path = None;
                    Ok(song)
                }
                _ => Ok(test_song(id, "good")),
            };
            async move { outcome }
        })
        .await
        .unwrap();

        assert_eq!(result.id, 30);
        assert_eq!(*calls.borrow(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_exhaustion_after_all_attempts() {
        let ids: Vec<u64> = (1..=15).collect();
        let calls = RefCell::new(0u32);
        let result = try_candidates(&ids, |id| {
            *calls.borrow_mut() += 1;
            let mut song = test_song(id, "session");
            song.category = Category::Other("session_edits".to_string());
            async move { Ok(song) }
        })
        .await;

        assert!(matches!(result, Err(CatalogError::RadioExhausted { attempts: 15 })));
        assert_eq!(*calls.borrow(), 15);
    }
}
