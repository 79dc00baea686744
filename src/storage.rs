use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, UserId};
use tokio::fs;
use tracing::{info, warn};

use crate::sources::TrackInfo;

/// Máximo de entradas de historial retenidas por guild
const MAX_HISTORY: usize = 200;

/// Ajustes persistentes de un servidor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSettings {
    pub default_volume: u8,
    pub default_filter: Option<String>,
    pub auto_disconnect: bool,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            default_volume: 100,
            default_filter: None,
            auto_disconnect: true,
        }
    }
}

/// Entrada del historial de reproducción.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    pub page_url: String,
    pub duration_seconds: u64,
    pub requested_by: u64,
    pub requested_by_name: String,
    pub played_at: DateTime<Utc>,
}

/// Track guardado dentro de una playlist de usuario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrack {
    pub title: String,
    pub page_url: String,
    pub duration_seconds: u64,
}

impl From<&TrackInfo> for StoredTrack {
    fn from(track: &TrackInfo) -> Self {
        Self {
            title: track.title.clone(),
            page_url: track.page_url.clone(),
            duration_seconds: track.duration_seconds,
        }
    }
}

/// Registro completo de un guild en disco.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GuildRecord {
    #[serde(default)]
    settings: Option<GuildSettings>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    /// user_id -> nombre de playlist -> tracks
    #[serde(default)]
    playlists: HashMap<u64, HashMap<String, Vec<StoredTrack>>>,
}

/// Almacenamiento JSON por guild: historial, playlists y ajustes.
pub struct JsonStorage {
    data_dir: PathBuf,
    records: HashMap<u64, GuildRecord>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;
        let guilds_dir = data_dir.join("guilds");
        fs::create_dir_all(&guilds_dir).await?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        let mut storage = Self {
            data_dir,
            records: HashMap::new(),
        };
        storage.load_all().await?;
        Ok(storage)
    }

    /// Registra un track reproducido en el historial del guild
    pub async fn save_history(
        &mut self,
        guild_id: GuildId,
        track: &TrackInfo,
        requested_by: UserId,
        requested_by_name: &str,
    ) -> Result<()> {
        let record = self.records.entry(guild_id.get()).or_default();
        record.history.push(HistoryEntry {
            title: track.title.clone(),
            page_url: track.page_url.clone(),
            duration_seconds: track.duration_seconds,
            requested_by: requested_by.get(),
            requested_by_name: requested_by_name.to_string(),
            played_at: Utc::now(),
        });
        while record.history.len() > MAX_HISTORY {
            record.history.remove(0);
        }
        self.persist(guild_id.get()).await
    }

    /// Historial reciente, el más nuevo primero
    #[allow(dead_code)]
    pub fn get_history(&self, guild_id: GuildId, limit: usize) -> Vec<HistoryEntry> {
        self.records
            .get(&guild_id.get())
            .map(|r| r.history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Guarda (o reemplaza) una playlist de usuario
    pub async fn save_playlist(
        &mut self,
        guild_id: GuildId,
        user_id: UserId,
        name: &str,
        tracks: Vec<StoredTrack>,
    ) -> bool {
        let record = self.records.entry(guild_id.get()).or_default();
        record
            .playlists
            .entry(user_id.get())
            .or_default()
            .insert(name.to_string(), tracks);

        match self.persist(guild_id.get()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("No se pudo guardar la playlist '{}': {}", name, e);
                false
            }
        }
    }

    pub fn load_playlist(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        name: &str,
    ) -> Option<Vec<StoredTrack>> {
        self.records
            .get(&guild_id.get())?
            .playlists
            .get(&user_id.get())?
            .get(name)
            .cloned()
    }

    /// Nombres de playlists de un usuario, orden alfabético
    pub fn list_playlists(&self, guild_id: GuildId, user_id: UserId) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .get(&guild_id.get())
            .and_then(|r| r.playlists.get(&user_id.get()))
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub async fn delete_playlist(
        &mut self,
        guild_id: GuildId,
        user_id: UserId,
        name: &str,
    ) -> bool {
        let removed = self
            .records
            .get_mut(&guild_id.get())
            .and_then(|r| r.playlists.get_mut(&user_id.get()))
            .and_then(|m| m.remove(name))
            .is_some();

        if removed {
            if let Err(e) = self.persist(guild_id.get()).await {
                warn!("No se pudo persistir el borrado de '{}': {}", name, e);
            }
        }
        removed
    }

    pub fn get_guild_settings(&self, guild_id: GuildId) -> GuildSettings {
        self.records
            .get(&guild_id.get())
            .and_then(|r| r.settings.clone())
            .unwrap_or_default()
    }

    #[allow(dead_code)]
    pub async fn update_guild_settings(
        &mut self,
        guild_id: GuildId,
        settings: GuildSettings,
    ) -> Result<()> {
        self.records.entry(guild_id.get()).or_default().settings = Some(settings);
        self.persist(guild_id.get()).await
    }

    // Métodos privados

    async fn persist(&self, guild_id: u64) -> Result<()> {
        let Some(record) = self.records.get(&guild_id) else {
            return Ok(());
        };
        let path = self.guild_file_path(guild_id);
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&path, content).await?;
        Ok(())
    }

    async fn load_all(&mut self) -> Result<()> {
        let guilds_dir = self.data_dir.join("guilds");
        let mut files = fs::read_dir(&guilds_dir).await?;
        let mut loaded = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let Some(guild_id) = path
                    .file_stem()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix("guild_"))
                    .and_then(|n| n.parse::<u64>().ok())
                else {
                    continue;
                };

                match fs::read_to_string(&path).await {
                    Ok(content) => match serde_json::from_str(&content) {
                        Ok(record) => {
                            self.records.insert(guild_id, record);
                            loaded += 1;
                        }
                        Err(e) => warn!("Registro corrupto para guild {}: {}", guild_id, e),
                    },
                    Err(e) => warn!("Error leyendo {}: {}", path.display(), e),
                }
            }
        }

        if loaded > 0 {
            info!("📂 Cargados {} registros de guild", loaded);
        }
        Ok(())
    }

    fn guild_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir
            .join("guilds")
            .join(format!("guild_{guild_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> TrackInfo {
        TrackInfo {
            title: title.to_string(),
            stream_url: "https://audio.example/s".to_string(),
            duration_seconds: 120,
            thumbnail_url: None,
            page_url: format!("https://page.example/{title}"),
        }
    }

    async fn fresh_storage(name: &str) -> (JsonStorage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("sala-music-test-{name}-{}", std::process::id()));
        let _ = tokio::fs::remove_dir_all(&dir).await;
        (JsonStorage::new(dir.clone()).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn test_history_roundtrip_and_cap() {
        let (mut storage, dir) = fresh_storage("history").await;
        let guild = GuildId::new(1);

        for i in 0..3 {
            storage
                .save_history(guild, &track(&format!("t{i}")), UserId::new(9), "ana")
                .await
                .unwrap();
        }

        let history = storage.get_history(guild, 2);
        assert_eq!(history.len(), 2);
        // Más nuevo primero
        assert_eq!(history[0].title, "t2");
        assert_eq!(history[1].title, "t1");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_playlist_save_load_delete() {
        let (mut storage, dir) = fresh_storage("playlists").await;
        let guild = GuildId::new(2);
        let user = UserId::new(7);
        let tracks = vec![StoredTrack::from(&track("uno")), StoredTrack::from(&track("dos"))];

        assert!(storage.save_playlist(guild, user, "favoritas", tracks.clone()).await);
        assert_eq!(storage.load_playlist(guild, user, "favoritas"), Some(tracks));
        assert_eq!(storage.list_playlists(guild, user), vec!["favoritas"]);

        assert!(storage.delete_playlist(guild, user, "favoritas").await);
        assert!(!storage.delete_playlist(guild, user, "favoritas").await);
        assert_eq!(storage.load_playlist(guild, user, "favoritas"), None);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_settings_default_and_update() {
        let (mut storage, dir) = fresh_storage("settings").await;
        let guild = GuildId::new(3);

        let defaults = storage.get_guild_settings(guild);
        assert_eq!(defaults.default_volume, 100);
        assert!(defaults.auto_disconnect);

        storage
            .update_guild_settings(
                guild,
                GuildSettings {
                    default_volume: 50,
                    default_filter: Some("bass".to_string()),
                    auto_disconnect: false,
                },
            )
            .await
            .unwrap();

        let updated = storage.get_guild_settings(guild);
        assert_eq!(updated.default_volume, 50);
        assert_eq!(updated.default_filter.as_deref(), Some("bass"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
