//! # Orchestrator Module
//!
//! Per-guild playback orchestration for Sala Music.
//!
//! Each guild with an open music room owns one [`GuildOrchestrator`]: the
//! request queue, the playback sequencer, the room lifecycle (scoped text
//! channel, permission sync, inactivity watchdog) and the ephemeral control
//! state (loop, auto-play, filter, vote-skip) all live here.
//!
//! ## Concurrency model
//!
//! All mutable state sits behind a short-lived sync mutex that is never held
//! across an `await`. Every entry point (slash command, room message, button
//! press, watchdog tick, playback-completion event) re-checks live state
//! after a suspension instead of trusting what it captured before. The
//! transport signals completion into a channel consumed by a dedicated task,
//! so advancing the queue never recurses on the signalling stack.

pub mod error;
pub mod gateway;
pub mod queue;
pub mod registry;
pub mod room;
mod sequencer;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audio::{AudioFilter, PlaybackEvent, PlaybackTransport};
use crate::logsink::LogSink;
use crate::sources::{QueueEntry, Resolved, TrackInfo, TrackResolver};
use crate::storage::JsonStorage;

pub use error::MusicError;
pub use gateway::{RoomGateway, RoomNotice};
pub use queue::RequestQueue;
pub use registry::OrchestratorRegistry;
pub use room::OpenOutcome;

/// Estado del sequencer de reproducción.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Resolving,
    Playing,
    AutoPlayFallback,
}

/// Tiempos y parámetros del ciclo de vida de la sala.
#[derive(Debug, Clone, Copy)]
pub struct RoomTimings {
    pub watchdog_interval: Duration,
    pub inactivity_timeout: Duration,
    pub warning_window: Duration,
    pub sync_cooldown: Duration,
    pub fade_steps: u32,
    pub fade_step_delay: Duration,
    /// Ganancia objetivo tras el fade in
    pub playback_volume: f32,
}

impl Default for RoomTimings {
    fn default() -> Self {
        Self {
            watchdog_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(300),
            warning_window: Duration::from_secs(60),
            sync_cooldown: Duration::from_secs(30),
            fade_steps: 10,
            fade_step_delay: Duration::from_millis(100),
            playback_volume: 0.3,
        }
    }
}

/// Estado mutable de la sala. El mutex que lo protege nunca se mantiene a
/// través de un await.
pub(crate) struct RoomState {
    pub queue: RequestQueue,
    pub current_track: Option<TrackInfo>,
    pub play_state: PlayState,
    pub loop_enabled: bool,
    pub auto_play_enabled: bool,
    pub selected_filter: Option<AudioFilter>,
    pub vote_skip: HashSet<UserId>,
    pub room_channel_id: Option<ChannelId>,
    pub voice_channel_id: Option<ChannelId>,
    pub now_playing_msg: Option<MessageId>,
    pub owner_id: Option<UserId>,
    pub last_activity_at: Instant,
    pub inactivity_warning_sent: bool,
    pub last_permission_sync: Option<Instant>,
    /// Cerrojo de teardown: una vez cerrado, ningún handler vuelve a mutar
    pub closed: bool,
}

impl RoomState {
    fn new() -> Self {
        Self {
            queue: RequestQueue::new(),
            current_track: None,
            play_state: PlayState::Idle,
            loop_enabled: false,
            auto_play_enabled: false,
            selected_filter: None,
            vote_skip: HashSet::new(),
            room_channel_id: None,
            voice_channel_id: None,
            now_playing_msg: None,
            owner_id: None,
            last_activity_at: Instant::now(),
            inactivity_warning_sent: false,
            last_permission_sync: None,
            closed: false,
        }
    }

    /// Vuelta a valores por defecto en el teardown
    fn reset(&mut self) {
        self.queue.clear();
        self.current_track = None;
        self.play_state = PlayState::Idle;
        self.loop_enabled = false;
        self.auto_play_enabled = false;
        self.selected_filter = None;
        self.vote_skip.clear();
        self.room_channel_id = None;
        self.voice_channel_id = None;
        self.now_playing_msg = None;
        self.owner_id = None;
        self.last_permission_sync = None;
    }
}

/// Colaboradores compartidos por todos los orquestadores del proceso.
#[derive(Clone)]
pub struct Services {
    pub resolver: Arc<dyn TrackResolver>,
    pub transport: Arc<dyn PlaybackTransport>,
    pub gateway: Arc<dyn RoomGateway>,
    pub storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    pub logs: Arc<LogSink>,
    pub timings: RoomTimings,
}

/// Resultado de una petición de música aceptada.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Single { title: String },
    Playlist { title: String, count: usize },
}

/// Resultado de un voto de skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub votes: usize,
    pub required: usize,
    pub passed: bool,
}

/// Vista de sólo lectura de la cola para listados.
#[derive(Debug, Clone)]
pub struct QueueView {
    pub current: Option<TrackInfo>,
    pub entries: Vec<QueueEntry>,
    pub loop_enabled: bool,
    pub auto_play_enabled: bool,
    pub selected_filter: Option<AudioFilter>,
}

/// Orquestador de reproducción de un servidor.
pub struct GuildOrchestrator {
    guild_id: GuildId,
    state: Mutex<RoomState>,
    resolver: Arc<dyn TrackResolver>,
    transport: Arc<dyn PlaybackTransport>,
    gateway: Arc<dyn RoomGateway>,
    storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    logs: Arc<LogSink>,
    registry: Weak<OrchestratorRegistry>,
    timings: RoomTimings,
    watchdog_token: CancellationToken,
}

impl GuildOrchestrator {
    pub(crate) fn spawn(
        guild_id: GuildId,
        services: &Services,
        registry: Weak<OrchestratorRegistry>,
    ) -> Arc<Self> {
        let orchestrator = Arc::new(Self {
            guild_id,
            state: Mutex::new(RoomState::new()),
            resolver: services.resolver.clone(),
            transport: services.transport.clone(),
            gateway: services.gateway.clone(),
            storage: services.storage.clone(),
            logs: services.logs.clone(),
            registry,
            timings: services.timings,
            watchdog_token: CancellationToken::new(),
        });

        let (tx, rx) = flume::unbounded();
        orchestrator.transport.subscribe(guild_id, tx);
        orchestrator.spawn_event_consumer(rx);
        orchestrator.spawn_watchdog();

        info!("🎛️ Orquestador creado para guild {}", guild_id);
        orchestrator
    }

    /// Canal de evento de finalización → re-entrada al sequencer como unidad
    /// de trabajo nueva, nunca recursión sobre la pila del transporte.
    fn spawn_event_consumer(self: &Arc<Self>, rx: flume::Receiver<PlaybackEvent>) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Ok(event) = rx.recv_async().await {
                let Some(orchestrator) = weak.upgrade() else {
                    break;
                };
                orchestrator.handle_playback_event(event).await;
            }
            debug!("📭 Consumidor de eventos de reproducción terminado");
        });
    }

    /// Resuelve una petición y la encola; arranca la reproducción si el
    /// sequencer está ocioso.
    pub async fn handle_request(
        &self,
        query: &str,
        requested_by: UserId,
        requester_name: &str,
    ) -> Result<RequestOutcome, MusicError> {
        if self.state.lock().closed {
            return Err(MusicError::NoRoom);
        }

        let (entries, outcome) = match self.resolver.resolve(query).await {
            Resolved::Track(track) => {
                let outcome = RequestOutcome::Single {
                    title: track.title.clone(),
                };
                (
                    vec![QueueEntry::resolved(track, requested_by, requester_name)],
                    outcome,
                )
            }
            Resolved::Playlist { title, entries } => {
                if entries.is_empty() {
                    return Err(MusicError::Resolution(format!(
                        "la playlist '{title}' no tiene entradas"
                    )));
                }
                let count = entries.len();
                let queue_entries = entries
                    .into_iter()
                    .map(|track| QueueEntry::resolved(track, requested_by, requester_name))
                    .collect();
                (queue_entries, RequestOutcome::Playlist { title, count })
            }
            Resolved::NotFound => {
                self.logs
                    .error(format!("No se pudo resolver la petición: {query}"));
                return Err(MusicError::Resolution(query.to_string()));
            }
        };

        self.add_to_queue(entries);

        match &outcome {
            RequestOutcome::Single { title } => {
                self.logs.play(format!("En cola: {title}"));
            }
            RequestOutcome::Playlist { title, count } => {
                self.logs
                    .play(format!("Playlist '{title}' en cola ({count} tracks)"));
            }
        }

        self.advance().await;
        Ok(outcome)
    }

    /// Encola entradas y reinicia el temporizador de inactividad
    pub fn add_to_queue(&self, entries: Vec<QueueEntry>) {
        let mut state = self.state.lock();
        state.queue.enqueue(entries);
        state.last_activity_at = Instant::now();
        state.inactivity_warning_sent = false;
    }

    /// Arranca la reproducción si el sequencer está ocioso y hay cola
    pub async fn play_if_idle(&self) {
        self.advance().await;
    }

    /// Elimina por índice 1-based; None si está fuera de rango
    pub fn remove_from_queue(&self, index: usize) -> Option<QueueEntry> {
        self.state.lock().queue.remove_at(index)
    }

    /// Mezcla la cola; false si tiene menos de 2 entradas
    pub fn shuffle_queue(&self) -> bool {
        self.state.lock().queue.shuffle()
    }

    pub fn queue_view(&self) -> QueueView {
        let state = self.state.lock();
        QueueView {
            current: state.current_track.clone(),
            entries: state.queue.snapshot(),
            loop_enabled: state.loop_enabled,
            auto_play_enabled: state.auto_play_enabled,
            selected_filter: state.selected_filter,
        }
    }

    pub fn current_track(&self) -> Option<TrackInfo> {
        self.state.lock().current_track.clone()
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.state.lock().owner_id
    }

    pub fn room_channel_id(&self) -> Option<ChannelId> {
        self.state.lock().room_channel_id
    }

    pub fn voice_channel_id(&self) -> Option<ChannelId> {
        self.state.lock().voice_channel_id
    }

    pub fn toggle_loop(&self) -> bool {
        let mut state = self.state.lock();
        state.loop_enabled = !state.loop_enabled;
        state.loop_enabled
    }

    pub fn toggle_auto_play(&self) -> bool {
        let mut state = self.state.lock();
        state.auto_play_enabled = !state.auto_play_enabled;
        state.auto_play_enabled
    }

    /// Valida y fija el filtro del siguiente track. El track en curso no se
    /// ve afectado.
    pub fn set_filter(&self, name: &str) -> Result<Option<AudioFilter>, MusicError> {
        let selection = AudioFilter::parse_selection(name)
            .map_err(|e| MusicError::UnknownFilter(e.0))?;
        self.state.lock().selected_filter = selection;
        Ok(selection)
    }

    /// Registra un voto de skip. El quórum se recalcula contra la ocupación
    /// elegible en vivo; el set se limpia cuando se alcanza.
    pub fn request_vote_skip(&self, voter: UserId) -> VoteOutcome {
        let voice_channel = self.state.lock().voice_channel_id;
        let eligible = voice_channel
            .map(|ch| self.gateway.eligible_occupants(self.guild_id, ch))
            .unwrap_or(0);
        let required = std::cmp::max(1, eligible / 2);

        let mut state = self.state.lock();
        state.vote_skip.insert(voter);
        let votes = state.vote_skip.len();
        let passed = votes >= required;
        if passed {
            state.vote_skip.clear();
        }
        VoteOutcome {
            votes,
            required,
            passed,
        }
    }

    #[allow(dead_code)]
    pub fn vote_status(&self) -> (usize, usize) {
        let voice_channel = self.state.lock().voice_channel_id;
        let eligible = voice_channel
            .map(|ch| self.gateway.eligible_occupants(self.guild_id, ch))
            .unwrap_or(0);
        let votes = self.state.lock().vote_skip.len();
        (votes, std::cmp::max(1, eligible / 2))
    }

    pub async fn pause(&self) -> bool {
        self.transport.pause(self.guild_id).await
    }

    pub async fn resume(&self) -> bool {
        self.transport.resume(self.guild_id).await
    }

    /// Volumen en porcentaje 0-200 sobre el track activo
    pub async fn set_volume(&self, percent: u8) {
        let volume = (f32::from(percent.min(200)) / 100.0).clamp(0.0, 2.0);
        self.transport.set_volume(self.guild_id, volume).await;
    }

    pub async fn volume_percent(&self) -> Option<u8> {
        self.transport
            .volume(self.guild_id)
            .await
            .map(|v| (v * 100.0).round() as u8)
    }

    /// Aviso best-effort al canal de la sala, si existe
    pub(crate) async fn notify_room(&self, notice: RoomNotice) {
        let channel = self.state.lock().room_channel_id;
        if let Some(channel) = channel {
            if let Err(e) = self.gateway.send_notice(channel, notice).await {
                debug!("No se pudo enviar aviso a la sala: {e}");
            }
        }
    }
}
