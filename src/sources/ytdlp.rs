use anyhow::{Context, Result};
use async_process::Command;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{classify_query, QueryKind, Resolved, TrackInfo, TrackResolver};
use async_trait::async_trait;

/// Resolver de respaldo que invoca yt-dlp. Más lento que Invidious pero
/// sobrevive cuando todas las instancias públicas están caídas.
pub struct YtDlpResolver {
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: tokio::sync::Semaphore,
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: String,
    url: Option<String>,
    formats: Option<Vec<Format>>,
}

#[derive(Debug, Deserialize)]
struct Format {
    url: String,
    acodec: Option<String>,
    abr: Option<f64>,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            rate_limiter: tokio::sync::Semaphore::new(3),
        }
    }

    async fn dump_json(&self, target: &str) -> Result<YtDlpInfo> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                target,
            ])
            .output()
            .await
            .context("error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim()).context("error al parsear respuesta de yt-dlp")
    }

    fn into_track(info: YtDlpInfo) -> Result<TrackInfo> {
        let stream_url = info
            .url
            .or_else(|| best_audio_format(info.formats.unwrap_or_default()))
            .context("yt-dlp no devolvió URL de stream")?;

        Ok(TrackInfo {
            title: info.title,
            stream_url,
            duration_seconds: info.duration.map(|d| d as u64).unwrap_or(0),
            thumbnail_url: info.thumbnail,
            page_url: info.webpage_url,
        })
    }
}

fn best_audio_format(formats: Vec<Format>) -> Option<String> {
    formats
        .into_iter()
        .filter(|f| f.acodec.as_deref().is_some_and(|c| c != "none"))
        .max_by(|a, b| {
            a.abr
                .unwrap_or(0.0)
                .total_cmp(&b.abr.unwrap_or(0.0))
        })
        .map(|f| f.url)
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Resolved {
        let target = match classify_query(query) {
            // Las playlists completas las maneja el resolver primario
            QueryKind::Playlist(_) => return Resolved::NotFound,
            QueryKind::Video(id) => format!("https://www.youtube.com/watch?v={id}"),
            QueryKind::Search => format!("ytsearch1:{query}"),
        };

        debug!("📊 yt-dlp resolviendo: {}", target);

        match self.dump_json(&target).await.and_then(Self::into_track) {
            Ok(track) => {
                info!("✅ yt-dlp resolvió: {}", track.title);
                Resolved::Track(track)
            }
            Err(e) => {
                warn!("❌ yt-dlp falló para '{}': {}", query, e);
                Resolved::NotFound
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_audio_format_prefers_highest_abr() {
        let formats = vec![
            Format {
                url: "low".into(),
                acodec: Some("opus".into()),
                abr: Some(64.0),
            },
            Format {
                url: "video-only".into(),
                acodec: Some("none".into()),
                abr: Some(999.0),
            },
            Format {
                url: "high".into(),
                acodec: Some("opus".into()),
                abr: Some(160.0),
            },
        ];

        assert_eq!(best_audio_format(formats).as_deref(), Some("high"));
    }

    #[test]
    fn test_best_audio_format_empty() {
        assert_eq!(best_audio_format(Vec::new()), None);
    }
}
