use rand::seq::SliceRandom;
use serenity::model::id::UserId;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{GuildOrchestrator, MusicError, PlayState, RoomNotice};
use crate::audio::{PlaybackEvent, PlaybackParams};
use crate::sources::{QueueEntry, Resolved, TrackInfo};

/// Palabras clave para el relleno de auto-play cuando la cola se vacía
const AUTO_PLAY_KEYWORDS: &[&str] = &["lofi hip hop", "pop hits", "EDM", "chill music"];

/// Espera máxima por una resolución antes de rendirse con esa entrada
const RESOLVE_WAIT: std::time::Duration = std::time::Duration::from_secs(30);

impl GuildOrchestrator {
    /// Punto de re-entrada del sequencer: extrae de la cola, resuelve y
    /// arranca el siguiente track. Un fallo de resolución nunca detiene la
    /// cola; se avanza a la siguiente entrada.
    pub(crate) async fn advance(&self) {
        // Reclamar el avance: sólo uno en vuelo por guild
        {
            let mut state = self.state.lock();
            if state.closed
                || state.current_track.is_some()
                || state.play_state != PlayState::Idle
            {
                return;
            }
            state.play_state = PlayState::Resolving;
        }

        loop {
            let entry = {
                let mut state = self.state.lock();
                if state.closed {
                    return;
                }
                match state.queue.dequeue_front() {
                    Some(entry) => {
                        // Con loop activo la entrada vuelve a la cola ANTES
                        // de reproducir: un fallo no la pierde
                        if state.loop_enabled {
                            state.queue.enqueue(vec![entry.clone()]);
                        }
                        state.play_state = PlayState::Resolving;
                        Some(entry)
                    }
                    None => None,
                }
            };

            let Some(entry) = entry else {
                let auto_play = {
                    let mut state = self.state.lock();
                    if state.closed {
                        return;
                    }
                    if state.auto_play_enabled {
                        state.play_state = PlayState::AutoPlayFallback;
                        true
                    } else {
                        false
                    }
                };

                if auto_play {
                    if let Some(filler) = self.auto_play_filler().await {
                        let mut state = self.state.lock();
                        if state.closed {
                            return;
                        }
                        state.queue.enqueue(vec![filler]);
                        continue;
                    }
                    warn!("🤖 Auto Play no encontró relleno para guild {}", self.guild_id);
                }

                self.state.lock().play_state = PlayState::Idle;
                info!(
                    "📭 Cola terminada en guild {}; empieza la cuenta de inactividad",
                    self.guild_id
                );
                self.notify_room(RoomNotice::QueueFinished).await;
                return;
            };

            match self.materialize(&entry).await {
                Ok(track) => match self.start_track(track, &entry).await {
                    Ok(()) => return,
                    Err(e) => {
                        error!("❌ Fallo arrancando track en guild {}: {}", self.guild_id, e);
                        self.logs.error(format!("Fallo de reproducción: {e}"));
                        self.notify_room(RoomNotice::PlaybackError {
                            message: e.to_string(),
                        })
                        .await;
                        continue;
                    }
                },
                Err(e) => {
                    warn!(
                        "🔍 Resolución fallida para '{}' en guild {}: {}",
                        entry.query, self.guild_id, e
                    );
                    self.logs
                        .error(format!("No se pudo resolver '{}'", entry.query));
                    self.notify_room(RoomNotice::RequestNotFound {
                        query: entry.query.clone(),
                    })
                    .await;
                    continue;
                }
            }
        }
    }

    /// Convierte una entrada de cola en un track reproducible. Las entradas
    /// pre-resueltas de playlist traen metadata pero sin stream directo.
    async fn materialize(&self, entry: &QueueEntry) -> Result<TrackInfo, MusicError> {
        if let Some(track) = &entry.resolved {
            if !track.stream_url.is_empty() {
                return Ok(track.clone());
            }
        }

        let target = entry
            .resolved
            .as_ref()
            .map(|t| t.page_url.as_str())
            .unwrap_or(&entry.query);

        let resolved = tokio::time::timeout(RESOLVE_WAIT, self.resolver.resolve(target))
            .await
            .map_err(|_| MusicError::Timeout)?;

        match resolved {
            Resolved::Track(track) => Ok(track),
            Resolved::Playlist { .. } | Resolved::NotFound => {
                Err(MusicError::Resolution(target.to_string()))
            }
        }
    }

    /// Arranca el transporte con fades: el saliente baja a cero antes de
    /// parar, el entrante sube de cero a la ganancia objetivo.
    async fn start_track(&self, track: TrackInfo, entry: &QueueEntry) -> Result<(), MusicError> {
        let filter = self.state.lock().selected_filter;

        if self.transport.is_active(self.guild_id).await {
            let from = self
                .transport
                .volume(self.guild_id)
                .await
                .unwrap_or(self.timings.playback_volume);
            self.fade_volume(from, 0.0).await;
            self.transport.stop(self.guild_id).await;
        }

        self.transport
            .start(
                self.guild_id,
                &track,
                PlaybackParams {
                    volume: 0.0,
                    filter,
                },
            )
            .await
            .map_err(|e| MusicError::Playback(e.to_string()))?;

        let room_channel = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(MusicError::ChannelMissing);
            }
            state.current_track = Some(track.clone());
            state.play_state = PlayState::Playing;
            state.vote_skip.clear();
            state.last_activity_at = Instant::now();
            state.inactivity_warning_sent = false;
            state.room_channel_id
        };

        info!("🎵 Reproduciendo: {} en guild {}", track.title, self.guild_id);
        self.logs
            .play(format!("Reproduciendo \"{}\"", track.title));

        self.record_history(&track, entry).await;

        if let Some(channel) = room_channel {
            let existing = self.state.lock().now_playing_msg;
            match self
                .gateway
                .upsert_now_playing(channel, existing, &track, &entry.requested_by_name)
                .await
            {
                Ok(message_id) => {
                    self.state.lock().now_playing_msg = Some(message_id);
                }
                Err(e) => debug!("No se pudo actualizar Now Playing: {e}"),
            }
        }

        self.fade_volume(0.0, self.timings.playback_volume).await;
        Ok(())
    }

    /// Fade lineal acotado: pasos fijos con retardo fijo por paso,
    /// independiente de la duración del track o de la red.
    async fn fade_volume(&self, from: f32, to: f32) {
        let steps = self.timings.fade_steps.max(1);
        let delta = (to - from) / steps as f32;
        let mut volume = from;
        for _ in 0..steps {
            volume = (volume + delta).clamp(0.0, 2.0);
            self.transport.set_volume(self.guild_id, volume).await;
            tokio::time::sleep(self.timings.fade_step_delay).await;
        }
    }

    /// Busca relleno para auto-play: palabra clave aleatoria, entrada
    /// aleatoria si el resultado es una playlist
    async fn auto_play_filler(&self) -> Option<QueueEntry> {
        let keyword = AUTO_PLAY_KEYWORDS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("lofi hip hop");
        info!("🤖 Auto Play busca '{}' en guild {}", keyword, self.guild_id);

        let track = match self.resolver.resolve(keyword).await {
            Resolved::Track(track) => track,
            Resolved::Playlist { entries, .. } => {
                entries.choose(&mut rand::thread_rng()).cloned()?
            }
            Resolved::NotFound => return None,
        };

        self.logs
            .play(format!("Auto Play añadió \"{}\"", track.title));
        Some(QueueEntry::resolved(track, UserId::default(), "Auto Play"))
    }

    /// Skip manual: con un track activo basta con parar el transporte y el
    /// evento de finalización avanza el sequencer (nunca doble avance). Sin
    /// track activo pero con cola, avanza directamente.
    pub async fn skip(&self) -> bool {
        let (playing, queued) = {
            let state = self.state.lock();
            (state.current_track.is_some(), !state.queue.is_empty())
        };

        if playing {
            // Bajar la ganancia antes de cortar evita el click audible
            let from = self
                .transport
                .volume(self.guild_id)
                .await
                .unwrap_or(self.timings.playback_volume);
            self.fade_volume(from, 0.0).await;
            self.transport.stop(self.guild_id).await;
            true
        } else if queued {
            self.advance().await;
            true
        } else {
            false
        }
    }

    /// Re-entrada desde el canal de eventos del transporte. Un error se
    /// registra y se trata igual que una finalización normal.
    pub(crate) async fn handle_playback_event(&self, event: PlaybackEvent) {
        if event == PlaybackEvent::Errored {
            error!("❌ El transporte reportó un error en guild {}", self.guild_id);
            self.logs
                .error("Error de reproducción; avanzando al siguiente track".to_string());
        }

        let should_advance = {
            let mut state = self.state.lock();
            if state.closed || state.play_state != PlayState::Playing {
                // Evento tardío de un track ya descartado (p. ej. el stop
                // durante un cambio con fade); el avance en vuelo manda
                false
            } else {
                state.current_track = None;
                state.play_state = PlayState::Idle;
                state.vote_skip.clear();
                true
            }
        };

        if should_advance {
            debug!("⏭️ Track terminado en guild {}, avanzando", self.guild_id);
            self.advance().await;
        }
    }

    async fn record_history(&self, track: &TrackInfo, entry: &QueueEntry) {
        let mut storage = self.storage.lock().await;
        if let Err(e) = storage
            .save_history(
                self.guild_id,
                track,
                entry.requested_by,
                &entry.requested_by_name,
            )
            .await
        {
            warn!("No se pudo guardar el historial: {e}");
        }
    }
}
