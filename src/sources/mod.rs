pub mod invidious;
pub mod ytdlp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serenity::model::id::UserId;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub use invidious::InvidiousResolver;
pub use ytdlp::YtDlpResolver;

/// Track resuelto y listo para reproducir. Inmutable una vez construido.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    /// URL de stream directo de audio
    pub stream_url: String,
    /// Duración en segundos (0 = en vivo o desconocida)
    pub duration_seconds: u64,
    pub thumbnail_url: Option<String>,
    pub page_url: String,
}

/// Resultado de una resolución: un track, una playlist completa, o nada.
#[derive(Debug, Clone)]
pub enum Resolved {
    Track(TrackInfo),
    Playlist { title: String, entries: Vec<TrackInfo> },
    NotFound,
}

impl Resolved {
    #[allow(dead_code)]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolved::NotFound)
    }
}

/// Petición pendiente en la cola de un servidor.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Query libre o URL tal como la escribió el usuario
    pub query: String,
    /// Descriptor ya resuelto (expansión de playlist en el momento de la petición)
    pub resolved: Option<TrackInfo>,
    pub requested_by: UserId,
    pub requested_by_name: String,
}

impl QueueEntry {
    pub fn new(query: impl Into<String>, requested_by: UserId, name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            resolved: None,
            requested_by,
            requested_by_name: name.into(),
        }
    }

    pub fn resolved(track: TrackInfo, requested_by: UserId, name: impl Into<String>) -> Self {
        Self {
            query: track.page_url.clone(),
            resolved: Some(track),
            requested_by,
            requested_by_name: name.into(),
        }
    }
}

/// Proveedor de resolución de tracks. Las implementaciones nunca deben
/// propagar fallos del proveedor: devuelven `Resolved::NotFound`.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una query libre, URL o ID a cero o más tracks
    async fn resolve(&self, query: &str) -> Resolved;

    /// Nombre del proveedor para logging
    fn provider_name(&self) -> &'static str;
}

fn video_id_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})").unwrap(),
            Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})").unwrap(),
            Regex::new(r"^([a-zA-Z0-9_-]{11})$").unwrap(),
        ]
    })
}

/// Extrae el ID de video de una URL de YouTube o de un ID pelado
pub fn extract_video_id(query: &str) -> Option<String> {
    video_id_patterns()
        .iter()
        .find_map(|re| re.captures(query))
        .map(|caps| caps[1].to_string())
}

/// Extrae el ID de playlist de una URL (`?list=` / `&list=`)
pub fn extract_playlist_id(query: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"[?&]list=([a-zA-Z0-9_-]+)").unwrap());
    re.captures(query).map(|caps| caps[1].to_string())
}

/// Clasificación de una query antes de tocar la red.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    Playlist(String),
    Video(String),
    Search,
}

pub fn classify_query(query: &str) -> QueryKind {
    if let Some(id) = extract_playlist_id(query) {
        return QueryKind::Playlist(id);
    }
    if let Some(id) = extract_video_id(query) {
        return QueryKind::Video(id);
    }
    QueryKind::Search
}

/// Cadena de proveedores con espera acotada. Intenta cada proveedor en
/// orden y degrada a `NotFound` si todos fallan o agotan el tiempo.
pub struct ResolverChain {
    providers: Vec<Arc<dyn TrackResolver>>,
    per_provider_timeout: Duration,
}

impl ResolverChain {
    pub fn new(providers: Vec<Arc<dyn TrackResolver>>, per_provider_timeout: Duration) -> Self {
        Self {
            providers,
            per_provider_timeout,
        }
    }
}

#[async_trait]
impl TrackResolver for ResolverChain {
    async fn resolve(&self, query: &str) -> Resolved {
        for provider in &self.providers {
            match tokio::time::timeout(self.per_provider_timeout, provider.resolve(query)).await {
                Ok(Resolved::NotFound) => {
                    debug!(
                        "🔍 {} no encontró resultados para '{}', probando siguiente",
                        provider.provider_name(),
                        query
                    );
                }
                Ok(found) => return found,
                Err(_) => {
                    warn!(
                        "⏰ Timeout de {} resolviendo '{}'",
                        provider.provider_name(),
                        query
                    );
                }
            }
        }
        Resolved::NotFound
    }

    fn provider_name(&self) -> &'static str {
        "chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_video_id_detection() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(extract_video_id("lofi hip hop radio"), None);
    }

    #[test]
    fn test_playlist_id_detection() {
        assert_eq!(
            extract_playlist_id("https://www.youtube.com/playlist?list=PLabc_123-XYZ"),
            Some("PLabc_123-XYZ".to_string())
        );
        assert_eq!(
            extract_playlist_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123"),
            Some("PL123".to_string())
        );
        assert_eq!(extract_playlist_id("https://youtu.be/dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_query_classification() {
        // Una URL con ?list= es playlist aunque también lleve video ID
        assert_eq!(
            classify_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123"),
            QueryKind::Playlist("PL123".to_string())
        );
        assert_eq!(
            classify_query("https://youtu.be/dQw4w9WgXcQ"),
            QueryKind::Video("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(classify_query("never gonna give you up"), QueryKind::Search);
    }

    struct FixedResolver(Resolved);

    #[async_trait]
    impl TrackResolver for FixedResolver {
        async fn resolve(&self, _query: &str) -> Resolved {
            self.0.clone()
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct HangingResolver;

    #[async_trait]
    impl TrackResolver for HangingResolver {
        async fn resolve(&self, _query: &str) -> Resolved {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Resolved::NotFound
        }

        fn provider_name(&self) -> &'static str {
            "hanging"
        }
    }

    fn track(title: &str) -> TrackInfo {
        TrackInfo {
            title: title.to_string(),
            stream_url: format!("https://audio.example/{title}"),
            duration_seconds: 180,
            thumbnail_url: None,
            page_url: format!("https://page.example/{title}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_falls_through_to_second_provider() {
        let chain = ResolverChain::new(
            vec![
                Arc::new(FixedResolver(Resolved::NotFound)),
                Arc::new(FixedResolver(Resolved::Track(track("segunda")))),
            ],
            Duration::from_secs(10),
        );

        match chain.resolve("lo que sea").await {
            Resolved::Track(t) => assert_eq!(t.title, "segunda"),
            other => panic!("esperaba Track, llegó {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_timeout_degrades_to_not_found() {
        let chain = ResolverChain::new(
            vec![Arc::new(HangingResolver)],
            Duration::from_secs(5),
        );

        assert!(chain.resolve("algo").await.is_not_found());
    }
}
