use std::process::Stdio;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use songbird::{
    input::{ChildContainer, HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use tracing::{debug, error, info, warn};

use super::{PlaybackEvent, PlaybackParams, PlaybackTransport};
use crate::sources::TrackInfo;

/// Transporte de audio respaldado por songbird. Uno por proceso; el estado
/// por guild vive en los mapas internos.
pub struct VoiceTransport {
    songbird: Arc<Songbird>,
    http_client: reqwest::Client,
    current_tracks: Arc<DashMap<GuildId, TrackHandle>>,
    subscribers: DashMap<GuildId, flume::Sender<PlaybackEvent>>,
}

impl VoiceTransport {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self {
            songbird,
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("no se pudo construir el cliente HTTP"),
            current_tracks: Arc::new(DashMap::new()),
            subscribers: DashMap::new(),
        }
    }

    /// Crea el input de audio. Sin filtro el stream va directo por HTTP;
    /// con filtro pasa por un proceso FFmpeg con `-af`.
    fn build_input(&self, track: &TrackInfo, params: &PlaybackParams) -> Result<Input> {
        if let Some(filter) = params.filter {
            debug!("🎛️ Aplicando filtro {} via FFmpeg", filter.as_str());
            let child = std::process::Command::new("ffmpeg")
                .args([
                    "-reconnect", "1",
                    "-reconnect_streamed", "1",
                    "-reconnect_delay_max", "5",
                    "-i", track.stream_url.as_str(),
                    "-vn",
                    "-b:a", "128k",
                    "-af", filter.ffmpeg_filter(),
                    "-f", "wav",
                    "pipe:1",
                ])
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()?;
            Ok(Input::from(ChildContainer::from(child)))
        } else {
            let request = HttpRequest::new(self.http_client.clone(), track.stream_url.clone());
            Ok(Input::from(request))
        }
    }
}

#[async_trait]
impl PlaybackTransport for VoiceTransport {
    async fn start(
        &self,
        guild_id: GuildId,
        track: &TrackInfo,
        params: PlaybackParams,
    ) -> Result<()> {
        let call = self
            .songbird
            .get(guild_id)
            .ok_or_else(|| anyhow::anyhow!("sin conexión de voz para guild {guild_id}"))?;

        let input = self.build_input(track, &params)?;

        let track_handle = {
            let mut handler = call.lock().await;
            handler.play_input(input)
        };

        let _ = track_handle.set_volume(params.volume);

        if let Some(tx) = self.subscribers.get(&guild_id) {
            let notifier = TrackEndNotifier {
                guild_id,
                tx: tx.clone(),
                current_tracks: self.current_tracks.clone(),
                errored: false,
            };
            track_handle
                .add_event(Event::Track(TrackEvent::End), notifier)
                .map_err(|e| anyhow::anyhow!("error registrando evento de fin: {e}"))?;

            let error_notifier = TrackEndNotifier {
                guild_id,
                tx: tx.clone(),
                current_tracks: self.current_tracks.clone(),
                errored: true,
            };
            track_handle
                .add_event(Event::Track(TrackEvent::Error), error_notifier)
                .map_err(|e| anyhow::anyhow!("error registrando evento de error: {e}"))?;
        } else {
            warn!("⚠️ Guild {} sin suscriptor de eventos de reproducción", guild_id);
        }

        info!("🎵 Transporte iniciado: {} en guild {}", track.title, guild_id);
        self.current_tracks.insert(guild_id, track_handle);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) {
        // El End que dispara stop() es el que avanza el sequencer
        if let Some(track) = self.current_tracks.get(&guild_id) {
            let _ = track.stop();
        }
    }

    async fn pause(&self, guild_id: GuildId) -> bool {
        if let Some(track) = self.current_tracks.get(&guild_id) {
            if let Ok(state) = track.get_info().await {
                if state.playing == PlayMode::Play {
                    let _ = track.pause();
                    return true;
                }
            }
        }
        false
    }

    async fn resume(&self, guild_id: GuildId) -> bool {
        if let Some(track) = self.current_tracks.get(&guild_id) {
            if let Ok(state) = track.get_info().await {
                if state.playing == PlayMode::Pause {
                    let _ = track.play();
                    return true;
                }
            }
        }
        false
    }

    async fn set_volume(&self, guild_id: GuildId, volume: f32) {
        if let Some(track) = self.current_tracks.get(&guild_id) {
            let _ = track.set_volume(volume.clamp(0.0, 2.0));
        }
    }

    async fn volume(&self, guild_id: GuildId) -> Option<f32> {
        let track = self.current_tracks.get(&guild_id)?;
        track.get_info().await.ok().map(|state| state.volume)
    }

    async fn is_active(&self, guild_id: GuildId) -> bool {
        if let Some(track) = self.current_tracks.get(&guild_id) {
            if let Ok(state) = track.get_info().await {
                return state.playing != PlayMode::Stop;
            }
        }
        false
    }

    fn subscribe(&self, guild_id: GuildId, tx: flume::Sender<PlaybackEvent>) {
        self.subscribers.insert(guild_id, tx);
    }

    fn unsubscribe(&self, guild_id: GuildId) {
        self.subscribers.remove(&guild_id);
        self.current_tracks.remove(&guild_id);
    }
}

/// Señala el fin (o error) de un track hacia el canal del guild. El primer
/// evento que retira el handle gana; los siguientes se descartan para no
/// avanzar dos veces por el mismo track.
struct TrackEndNotifier {
    guild_id: GuildId,
    tx: flume::Sender<PlaybackEvent>,
    current_tracks: Arc<DashMap<GuildId, TrackHandle>>,
    errored: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if self.errored {
            if let EventContext::Track(track_list) = ctx {
                for (state, _handle) in *track_list {
                    error!(
                        "❌ Error en track para guild {}: {:?}",
                        self.guild_id, state.playing
                    );
                }
            }
        }

        if self.current_tracks.remove(&self.guild_id).is_some() {
            let event = if self.errored {
                PlaybackEvent::Errored
            } else {
                PlaybackEvent::Finished
            };
            if self.tx.send(event).is_err() {
                debug!("📭 Canal de eventos cerrado para guild {}", self.guild_id);
            }
        }

        None
    }
}
