use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{classify_query, QueryKind, Resolved, TrackInfo, TrackResolver};

/// Instancias públicas de Invidious. Se prueban en orden hasta que una responde.
const INSTANCES: &[&str] = &[
    "https://inv.nadeko.net",
    "https://invidious.private.coffee",
    "https://iv.nboeck.de",
    "https://invidious.fdn.fr",
    "https://inv.tux.pizza",
    "https://invidious.perennialte.ch",
];

/// Resolver primario respaldado por la API de Invidious.
pub struct InvidiousResolver {
    client: reqwest::Client,
    instances: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    title: String,
    #[serde(rename = "lengthSeconds")]
    length_seconds: Option<u64>,
    #[serde(rename = "adaptiveFormats")]
    adaptive_formats: Option<Vec<AdaptiveFormat>>,
}

#[derive(Debug, Deserialize)]
struct AdaptiveFormat {
    url: String,
    #[serde(rename = "type")]
    format_type: String,
    bitrate: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    title: String,
    videos: Vec<PlaylistVideo>,
}

#[derive(Debug, Deserialize)]
struct PlaylistVideo {
    #[serde(rename = "videoId")]
    video_id: String,
    title: String,
    #[serde(rename = "lengthSeconds")]
    length_seconds: Option<u64>,
}

impl InvidiousResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("no se pudo construir el cliente HTTP");

        Self {
            client,
            instances: INSTANCES.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn get_video(&self, video_id: &str) -> Result<TrackInfo> {
        for instance in &self.instances {
            let url = format!("{instance}/api/v1/videos/{video_id}");
            match self.try_get_video(&url, video_id).await {
                Ok(track) => return Ok(track),
                Err(e) => {
                    warn!("❌ {} falló para video {}: {}", instance, video_id, e);
                }
            }
        }
        anyhow::bail!("todas las instancias de Invidious fallaron para {video_id}")
    }

    async fn try_get_video(&self, url: &str, video_id: &str) -> Result<TrackInfo> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let video: VideoResponse = resp.json().await?;

        // Mejor stream de audio por bitrate
        let mut audio: Vec<AdaptiveFormat> = video
            .adaptive_formats
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f.format_type.starts_with("audio/"))
            .collect();
        audio.sort_by_key(|f| std::cmp::Reverse(parse_bitrate(f.bitrate.as_ref())));

        let best = audio
            .into_iter()
            .next()
            .context("el video no tiene streams de audio")?;

        Ok(TrackInfo {
            title: video.title,
            stream_url: best.url,
            duration_seconds: video.length_seconds.unwrap_or(0),
            thumbnail_url: Some(format!("https://i.ytimg.com/vi/{video_id}/maxresdefault.jpg")),
            page_url: format!("https://www.youtube.com/watch?v={video_id}"),
        })
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<(String, Vec<TrackInfo>)> {
        for instance in &self.instances {
            let url = format!("{instance}/api/v1/playlists/{playlist_id}");
            match self.try_get_playlist(&url).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("❌ {} falló para playlist {}: {}", instance, playlist_id, e);
                }
            }
        }
        anyhow::bail!("todas las instancias de Invidious fallaron para playlist {playlist_id}")
    }

    async fn try_get_playlist(&self, url: &str) -> Result<(String, Vec<TrackInfo>)> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let playlist: PlaylistResponse = resp.json().await?;

        let entries = playlist
            .videos
            .into_iter()
            .map(|v| TrackInfo {
                title: v.title,
                // El stream directo se resuelve al momento de reproducir
                stream_url: String::new(),
                duration_seconds: v.length_seconds.unwrap_or(0),
                thumbnail_url: Some(format!(
                    "https://i.ytimg.com/vi/{}/maxresdefault.jpg",
                    v.video_id
                )),
                page_url: format!("https://www.youtube.com/watch?v={}", v.video_id),
            })
            .collect();

        Ok((playlist.title, entries))
    }

    async fn search_top_hit(&self, query: &str) -> Result<String> {
        let encoded = urlencoding::encode(query);
        for instance in &self.instances {
            let url = format!(
                "{instance}/api/v1/search?q={encoded}&type=video&sort_by=relevance"
            );
            match self.try_search(&url).await {
                Ok(Some(video_id)) => {
                    debug!("🔍 Top hit en {}: {}", instance, video_id);
                    return Ok(video_id);
                }
                Ok(None) => {
                    warn!("⚠️ {} devolvió 0 resultados", instance);
                }
                Err(e) => {
                    warn!("❌ Falló búsqueda en {}: {}", instance, e);
                }
            }
        }
        anyhow::bail!("sin resultados de búsqueda para '{query}'")
    }

    async fn try_search(&self, url: &str) -> Result<Option<String>> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let items: Vec<SearchItem> = resp.json().await?;
        Ok(items.into_iter().next().map(|item| item.video_id))
    }
}

#[async_trait]
impl TrackResolver for InvidiousResolver {
    async fn resolve(&self, query: &str) -> Resolved {
        let result = match classify_query(query) {
            QueryKind::Playlist(playlist_id) => self
                .get_playlist(&playlist_id)
                .await
                .map(|(title, entries)| Resolved::Playlist { title, entries }),
            QueryKind::Video(video_id) => {
                self.get_video(&video_id).await.map(Resolved::Track)
            }
            QueryKind::Search => match self.search_top_hit(query).await {
                Ok(video_id) => self.get_video(&video_id).await.map(Resolved::Track),
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(resolved) => resolved,
            Err(e) => {
                info!("🔍 Invidious no pudo resolver '{}': {}", query, e);
                Resolved::NotFound
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "invidious"
    }
}

fn parse_bitrate(value: Option<&serde_json::Value>) -> u64 {
    // Algunas instancias devuelven el bitrate como string
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bitrate_variants() {
        assert_eq!(
            parse_bitrate(Some(&serde_json::json!(128000))),
            128000
        );
        assert_eq!(
            parse_bitrate(Some(&serde_json::json!("96000"))),
            96000
        );
        assert_eq!(parse_bitrate(Some(&serde_json::json!("junk"))), 0);
        assert_eq!(parse_bitrate(None), 0);
    }
}
