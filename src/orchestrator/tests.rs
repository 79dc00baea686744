use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};

use super::{
    MusicError, OpenOutcome, OrchestratorRegistry, RequestOutcome, RoomGateway, RoomNotice,
    RoomTimings, Services,
};
use crate::audio::{AudioFilter, PlaybackEvent, PlaybackParams, PlaybackTransport};
use crate::logsink::LogSink;
use crate::sources::{QueueEntry, Resolved, TrackInfo, TrackResolver};
use crate::storage::JsonStorage;

// Dobles de prueba

struct FakeResolver {
    responses: Mutex<HashMap<String, Resolved>>,
    default: Mutex<Resolved>,
}

impl FakeResolver {
    fn new() -> Self {
        Self::with_default(Resolved::NotFound)
    }

    fn with_default(default: Resolved) -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            default: Mutex::new(default),
        }
    }

    fn script(&self, query: &str, response: Resolved) {
        self.responses.lock().insert(query.to_string(), response);
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, query: &str) -> Resolved {
        self.responses
            .lock()
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default.lock().clone())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StartRecord {
    title: String,
    params: PlaybackParams,
}

#[derive(Default)]
struct FakeTransport {
    started: Mutex<Vec<StartRecord>>,
    active: Mutex<bool>,
    volume: Mutex<f32>,
    tx: Mutex<Option<flume::Sender<PlaybackEvent>>>,
}

impl FakeTransport {
    fn started(&self) -> Vec<StartRecord> {
        self.started.lock().clone()
    }

    fn started_titles(&self) -> Vec<String> {
        self.started.lock().iter().map(|r| r.title.clone()).collect()
    }

    fn emit(&self, event: PlaybackEvent) {
        *self.active.lock() = false;
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// El track actual termina de forma natural
    fn finish_current(&self) {
        self.emit(PlaybackEvent::Finished);
    }

    /// El transporte reporta un error a mitad de stream
    fn error_current(&self) {
        self.emit(PlaybackEvent::Errored);
    }
}

#[async_trait]
impl PlaybackTransport for FakeTransport {
    async fn start(
        &self,
        _guild_id: GuildId,
        track: &TrackInfo,
        params: PlaybackParams,
    ) -> anyhow::Result<()> {
        *self.active.lock() = true;
        *self.volume.lock() = params.volume;
        self.started.lock().push(StartRecord {
            title: track.title.clone(),
            params,
        });
        Ok(())
    }

    async fn stop(&self, _guild_id: GuildId) {
        // Como songbird: parar un track dispara su evento de fin
        if *self.active.lock() {
            self.emit(PlaybackEvent::Finished);
        }
    }

    async fn pause(&self, _guild_id: GuildId) -> bool {
        *self.active.lock()
    }

    async fn resume(&self, _guild_id: GuildId) -> bool {
        false
    }

    async fn set_volume(&self, _guild_id: GuildId, volume: f32) {
        *self.volume.lock() = volume;
    }

    async fn volume(&self, _guild_id: GuildId) -> Option<f32> {
        if *self.active.lock() {
            Some(*self.volume.lock())
        } else {
            None
        }
    }

    async fn is_active(&self, _guild_id: GuildId) -> bool {
        *self.active.lock()
    }

    fn subscribe(&self, _guild_id: GuildId, tx: flume::Sender<PlaybackEvent>) {
        *self.tx.lock() = Some(tx);
    }

    fn unsubscribe(&self, _guild_id: GuildId) {
        *self.tx.lock() = None;
    }
}

#[derive(Default)]
struct FakeGateway {
    occupants: AtomicUsize,
    channel_counter: AtomicUsize,
    created_channels: Mutex<Vec<ChannelId>>,
    deleted_channels: Mutex<Vec<ChannelId>>,
    notices: Mutex<Vec<RoomNotice>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    grants: AtomicUsize,
}

impl FakeGateway {
    fn warning_count(&self) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|n| matches!(n, RoomNotice::InactivityWarning))
            .count()
    }
}

#[async_trait]
impl RoomGateway for FakeGateway {
    async fn create_room_channel(
        &self,
        _guild_id: GuildId,
        _name: &str,
        _voice_channel: ChannelId,
    ) -> Result<ChannelId, MusicError> {
        let id = ChannelId::new(900 + self.channel_counter.fetch_add(1, Ordering::SeqCst) as u64);
        self.created_channels.lock().push(id);
        Ok(id)
    }

    async fn delete_room_channel(
        &self,
        _guild_id: GuildId,
        channel: ChannelId,
    ) -> Result<(), MusicError> {
        self.deleted_channels.lock().push(channel);
        Ok(())
    }

    async fn grant_room_access(
        &self,
        _guild_id: GuildId,
        _channel: ChannelId,
        _voice_channel: ChannelId,
    ) -> Result<usize, MusicError> {
        self.grants.fetch_add(1, Ordering::SeqCst);
        Ok(self.occupants.load(Ordering::SeqCst))
    }

    fn eligible_occupants(&self, _guild_id: GuildId, _voice_channel: ChannelId) -> usize {
        self.occupants.load(Ordering::SeqCst)
    }

    async fn connect_voice(
        &self,
        _guild_id: GuildId,
        _voice_channel: ChannelId,
    ) -> Result<(), MusicError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect_voice(&self, _guild_id: GuildId) -> Result<(), MusicError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_notice(
        &self,
        _channel: ChannelId,
        notice: RoomNotice,
    ) -> Result<(), MusicError> {
        self.notices.lock().push(notice);
        Ok(())
    }

    async fn upsert_now_playing(
        &self,
        _channel: ChannelId,
        existing: Option<MessageId>,
        _track: &TrackInfo,
        _requested_by_name: &str,
    ) -> Result<MessageId, MusicError> {
        Ok(existing.unwrap_or(MessageId::new(1)))
    }

    async fn delete_message(
        &self,
        _channel: ChannelId,
        _message: MessageId,
    ) -> Result<(), MusicError> {
        Ok(())
    }
}

// Arnés de pruebas

struct Harness {
    registry: Arc<OrchestratorRegistry>,
    resolver: Arc<FakeResolver>,
    transport: Arc<FakeTransport>,
    gateway: Arc<FakeGateway>,
    _data_dir: std::path::PathBuf,
}

const GUILD: GuildId = GuildId::new(42);
const VOICE: ChannelId = ChannelId::new(7);

fn short_timings() -> RoomTimings {
    RoomTimings {
        watchdog_interval: Duration::from_secs(5),
        inactivity_timeout: Duration::from_secs(30),
        warning_window: Duration::from_secs(10),
        sync_cooldown: Duration::from_secs(5),
        fade_steps: 2,
        fade_step_delay: Duration::from_millis(10),
        playback_volume: 0.3,
    }
}

async fn harness() -> Harness {
    harness_with(FakeResolver::new(), short_timings()).await
}

async fn harness_with(resolver: FakeResolver, timings: RoomTimings) -> Harness {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let data_dir = std::env::temp_dir().join(format!(
        "sala-music-orch-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = tokio::fs::remove_dir_all(&data_dir).await;
    let storage = JsonStorage::new(data_dir.clone()).await.unwrap();

    let resolver = Arc::new(resolver);
    let transport = Arc::new(FakeTransport::default());
    let gateway = Arc::new(FakeGateway::default());

    let services = Services {
        resolver: resolver.clone(),
        transport: transport.clone(),
        gateway: gateway.clone(),
        storage: Arc::new(tokio::sync::Mutex::new(storage)),
        logs: Arc::new(LogSink::new(50)),
        timings,
    };

    Harness {
        registry: OrchestratorRegistry::new(services),
        resolver,
        transport,
        gateway,
        _data_dir: data_dir,
    }
}

fn track(title: &str) -> TrackInfo {
    TrackInfo {
        title: title.to_string(),
        stream_url: format!("https://audio.example/{title}"),
        duration_seconds: 200,
        thumbnail_url: None,
        page_url: format!("https://page.example/{title}"),
    }
}

fn resolved_entry(title: &str) -> QueueEntry {
    QueueEntry::resolved(track(title), UserId::new(100), "tester")
}

/// Deja correr las tareas del runtime (consumidor de eventos, watchdog)
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

// Sequencer

#[tokio::test(start_paused = true)]
async fn sequencer_plays_queue_in_order_then_goes_idle() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    orch.add_to_queue(vec![resolved_entry("A"), resolved_entry("B")]);
    orch.play_if_idle().await;
    assert_eq!(h.transport.started_titles(), vec!["A"]);

    h.transport.finish_current();
    settle().await;
    assert_eq!(h.transport.started_titles(), vec!["A", "B"]);

    h.transport.finish_current();
    settle().await;
    assert_eq!(h.transport.started_titles(), vec!["A", "B"]);
    assert!(orch.current_track().is_none());
}

#[tokio::test(start_paused = true)]
async fn loop_mode_reappends_entry_before_playback_starts() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    orch.toggle_loop();
    orch.add_to_queue(vec![resolved_entry("A")]);
    orch.play_if_idle().await;

    // A suena y al mismo tiempo ya volvió a la cola
    assert_eq!(orch.current_track().unwrap().title, "A");
    let view = orch.queue_view();
    assert_eq!(view.entries.len(), 1);
    assert_eq!(view.entries[0].resolved.as_ref().unwrap().title, "A");

    // La rotación continúa indefinidamente
    h.transport.finish_current();
    settle().await;
    assert_eq!(h.transport.started_titles(), vec!["A", "A"]);
    assert_eq!(orch.queue_view().entries.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_resolution_advances_to_next_entry() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    // La cabeza no resuelve; la segunda entrada sí
    orch.add_to_queue(vec![
        QueueEntry::new("rota", UserId::new(100), "tester"),
        resolved_entry("B"),
    ]);
    orch.play_if_idle().await;
    settle().await;

    assert_eq!(h.transport.started_titles(), vec!["B"]);
    assert_eq!(orch.current_track().unwrap().title, "B");
}

#[tokio::test(start_paused = true)]
async fn playback_error_is_treated_as_completion() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    orch.add_to_queue(vec![resolved_entry("A"), resolved_entry("B")]);
    orch.play_if_idle().await;

    h.transport.error_current();
    settle().await;

    assert_eq!(h.transport.started_titles(), vec!["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn manual_skip_does_not_double_advance() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    orch.add_to_queue(vec![resolved_entry("A"), resolved_entry("B")]);
    orch.play_if_idle().await;

    assert!(orch.skip().await);
    settle().await;
    assert_eq!(h.transport.started_titles(), vec!["A", "B"]);

    assert!(orch.skip().await);
    settle().await;
    // Cola vacía tras B: ocioso, sin arranques extra
    assert_eq!(h.transport.started_titles(), vec!["A", "B"]);
    assert!(!orch.skip().await);
}

#[tokio::test(start_paused = true)]
async fn filter_applies_only_to_next_started_track() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    orch.add_to_queue(vec![resolved_entry("A"), resolved_entry("B")]);
    orch.play_if_idle().await;

    // Cambio de filtro con A sonando: A no se ve afectada
    orch.set_filter("bass").unwrap();
    let started = h.transport.started();
    assert_eq!(started[0].params.filter, None);

    h.transport.finish_current();
    settle().await;

    let started = h.transport.started();
    assert_eq!(started[1].title, "B");
    assert_eq!(started[1].params.filter, Some(AudioFilter::Bass));
}

#[tokio::test(start_paused = true)]
async fn unknown_filter_is_rejected_without_state_change() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    orch.set_filter("nightcore").unwrap();
    assert!(matches!(
        orch.set_filter("reverb"),
        Err(MusicError::UnknownFilter(_))
    ));
    assert_eq!(
        orch.queue_view().selected_filter,
        Some(AudioFilter::Nightcore)
    );
}

#[tokio::test(start_paused = true)]
async fn auto_play_fills_queue_when_empty() {
    let resolver = FakeResolver::with_default(Resolved::Track(track("filler")));
    let h = harness_with(resolver, short_timings()).await;
    let orch = h.registry.get_or_create(GUILD);

    orch.toggle_auto_play();
    orch.add_to_queue(vec![resolved_entry("A")]);
    orch.play_if_idle().await;

    h.transport.finish_current();
    settle().await;

    assert_eq!(h.transport.started_titles(), vec!["A", "filler"]);
}

#[tokio::test(start_paused = true)]
async fn auto_play_failure_falls_to_idle() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    orch.toggle_auto_play();
    orch.add_to_queue(vec![resolved_entry("A")]);
    orch.play_if_idle().await;

    h.transport.finish_current();
    settle().await;

    assert_eq!(h.transport.started_titles(), vec!["A"]);
    assert!(orch.current_track().is_none());
}

#[tokio::test(start_paused = true)]
async fn handle_request_resolves_single_and_playlist() {
    let h = harness().await;
    h.resolver.script("hola", Resolved::Track(track("Hola Mundo")));
    h.resolver.script(
        "mi-lista",
        Resolved::Playlist {
            title: "Mix".to_string(),
            entries: vec![track("uno"), track("dos")],
        },
    );
    let orch = h.registry.get_or_create(GUILD);

    let outcome = orch
        .handle_request("hola", UserId::new(1), "ana")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RequestOutcome::Single {
            title: "Hola Mundo".to_string()
        }
    );

    let outcome = orch
        .handle_request("mi-lista", UserId::new(1), "ana")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RequestOutcome::Playlist {
            title: "Mix".to_string(),
            count: 2
        }
    );

    // "Hola Mundo" suena; "uno" y "dos" esperan en orden
    assert_eq!(h.transport.started_titles(), vec!["Hola Mundo"]);
    let titles: Vec<String> = orch
        .queue_view()
        .entries
        .iter()
        .map(|e| e.resolved.as_ref().unwrap().title.clone())
        .collect();
    assert_eq!(titles, vec!["uno", "dos"]);
}

#[tokio::test(start_paused = true)]
async fn handle_request_not_found_is_an_error_not_a_crash() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    let result = orch.handle_request("nada", UserId::new(1), "ana").await;
    assert!(matches!(result, Err(MusicError::Resolution(_))));
    assert!(h.transport.started_titles().is_empty());
}

// Voto de skip

#[tokio::test(start_paused = true)]
async fn vote_skip_quorum_is_half_of_eligible_occupants() {
    let h = harness().await;
    h.gateway.occupants.store(5, Ordering::SeqCst);
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    // 5 elegibles -> quórum 2
    let vote = orch.request_vote_skip(UserId::new(1));
    assert_eq!((vote.votes, vote.required, vote.passed), (1, 2, false));

    // El mismo votante no cuenta dos veces
    let vote = orch.request_vote_skip(UserId::new(1));
    assert!(!vote.passed);

    let vote = orch.request_vote_skip(UserId::new(2));
    assert!(vote.passed);

    // El set queda vacío tras alcanzar el quórum
    assert_eq!(orch.vote_status().0, 0);
}

#[tokio::test(start_paused = true)]
async fn vote_skip_quorum_is_at_least_one() {
    let h = harness().await;
    h.gateway.occupants.store(1, Ordering::SeqCst);
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    let vote = orch.request_vote_skip(UserId::new(1));
    assert_eq!((vote.required, vote.passed), (1, true));
}

#[tokio::test(start_paused = true)]
async fn votes_clear_when_song_advances() {
    let h = harness().await;
    h.gateway.occupants.store(9, Ordering::SeqCst);
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    orch.add_to_queue(vec![resolved_entry("A"), resolved_entry("B")]);
    orch.play_if_idle().await;

    orch.request_vote_skip(UserId::new(2));
    orch.request_vote_skip(UserId::new(3));
    assert_eq!(orch.vote_status().0, 2);

    h.transport.finish_current();
    settle().await;

    assert_eq!(orch.vote_status().0, 0);
}

// Ciclo de vida de la sala

#[tokio::test(start_paused = true)]
async fn open_room_is_idempotent_for_owner_and_guarded_for_others() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);

    let first = orch
        .open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();
    let OpenOutcome::Created(channel) = first else {
        panic!("esperaba Created, llegó {first:?}");
    };

    // Re-entrada del dueño: misma sala
    let second = orch
        .open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();
    assert_eq!(second, OpenOutcome::Rejoined(channel));
    assert_eq!(h.gateway.created_channels.lock().len(), 1);

    // Otro usuario sin permisos: rechazado
    let third = orch.open_room(UserId::new(2), "bruno", VOICE, false).await;
    assert!(matches!(third, Err(MusicError::RoomOwned(owner)) if owner == UserId::new(1)));
    assert_eq!(orch.owner_id(), Some(UserId::new(1)));

    // Un admin puede tomar la sala
    let fourth = orch
        .open_room(UserId::new(2), "bruno", VOICE, true)
        .await
        .unwrap();
    assert_eq!(fourth, OpenOutcome::Rejoined(channel));
    assert_eq!(orch.owner_id(), Some(UserId::new(2)));

    // La apertura rechazada nunca llegó a tocar la voz
    assert_eq!(h.gateway.connects.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn close_room_is_idempotent() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    orch.close_room().await;
    orch.close_room().await;

    assert_eq!(h.gateway.deleted_channels.lock().len(), 1);
    assert_eq!(h.gateway.disconnects.load(Ordering::SeqCst), 1);
    assert!(h.registry.get(GUILD).is_none());
}

#[tokio::test(start_paused = true)]
async fn external_disconnect_tears_down_without_second_disconnect() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    orch.handle_external_disconnect().await;

    assert_eq!(h.gateway.disconnects.load(Ordering::SeqCst), 0);
    assert_eq!(h.gateway.deleted_channels.lock().len(), 1);
    assert!(h.registry.get(GUILD).is_none());
}

#[tokio::test(start_paused = true)]
async fn sync_permissions_is_rate_limited_per_guild() {
    let h = harness().await;
    h.gateway.occupants.store(3, Ordering::SeqCst);
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();
    assert_eq!(orch.sync_permissions().await.unwrap(), 3);

    assert!(matches!(
        orch.sync_permissions().await,
        Err(MusicError::RateLimited(_))
    ));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(orch.sync_permissions().await.unwrap(), 3);
}

// Watchdog de inactividad

#[tokio::test(start_paused = true)]
async fn watchdog_warns_once_then_tears_down() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    // timeout 30s, aviso a los 20s, tick cada 5s
    tokio::time::sleep(Duration::from_secs(22)).await;
    assert_eq!(h.gateway.warning_count(), 1);
    assert!(h.registry.get(GUILD).is_some());

    tokio::time::sleep(Duration::from_secs(5)).await;
    // Sigue ocioso: sin segundo aviso
    assert_eq!(h.gateway.warning_count(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.gateway.deleted_channels.lock().len(), 1);
    assert!(h.registry.get(GUILD).is_none());
}

#[tokio::test(start_paused = true)]
async fn activity_resets_inactivity_window_and_warning() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(22)).await;
    assert_eq!(h.gateway.warning_count(), 1);

    // Una petición reinicia ventana y aviso
    orch.add_to_queue(vec![resolved_entry("A")]);
    orch.play_if_idle().await;
    h.transport.finish_current();
    settle().await;

    // La sala sobrevive más allá del timeout original
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(h.registry.get(GUILD).is_some());

    // Y el aviso puede volver a dispararse en el nuevo periodo ocioso
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.gateway.warning_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn watchdog_does_not_count_while_music_plays() {
    let h = harness().await;
    let orch = h.registry.get_or_create(GUILD);
    orch.open_room(UserId::new(1), "ana", VOICE, false)
        .await
        .unwrap();

    orch.add_to_queue(vec![resolved_entry("larga")]);
    orch.play_if_idle().await;

    // Mucho más allá del timeout, pero con música sonando
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.gateway.warning_count(), 0);
    assert!(h.registry.get(GUILD).is_some());
}

// Registro

#[tokio::test(start_paused = true)]
async fn registry_creates_lazily_and_removes_explicitly() {
    let h = harness().await;
    assert!(h.registry.get(GUILD).is_none());
    assert_eq!(h.registry.active_count(), 0);

    let orch = h.registry.get_or_create(GUILD);
    assert_eq!(h.registry.active_count(), 1);
    assert!(Arc::ptr_eq(&orch, &h.registry.get_or_create(GUILD)));

    h.registry.remove(GUILD);
    assert!(h.registry.get(GUILD).is_none());
}
