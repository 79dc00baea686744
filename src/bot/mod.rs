//! # Bot Module
//!
//! Discord adapter for Sala Music.
//!
//! [`SalaMusicBot`] implements serenity's [`EventHandler`] and is a thin
//! input layer: it parses interactions and room messages, runs the guard
//! checks, and forwards everything to the per-guild orchestrator owned by
//! the injected [`OrchestratorRegistry`]. No playback or lifecycle logic
//! lives here.

use std::sync::Arc;

use dashmap::DashMap;
use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
    model::id::UserId,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod gateway;
pub mod handlers;

use crate::{
    bot::gateway::SerenityGateway,
    config::Config,
    dashboard::BotStatus,
    logsink::LogSink,
    orchestrator::{MusicError, OrchestratorRegistry, RequestOutcome, RoomNotice},
    storage::JsonStorage,
    ui::embeds,
};

pub struct SalaMusicBot {
    config: Arc<Config>,
    pub registry: Arc<OrchestratorRegistry>,
    pub gateway: Arc<SerenityGateway>,
    pub storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    pub logs: Arc<LogSink>,
    pub status: Arc<BotStatus>,
    /// Anti-spam de peticiones por mensaje, por usuario
    message_cooldowns: DashMap<UserId, Instant>,
    /// Cooldown de pulsaciones de botones, por usuario
    button_cooldowns: DashMap<UserId, Instant>,
}

impl SalaMusicBot {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<OrchestratorRegistry>,
        gateway: Arc<SerenityGateway>,
        storage: Arc<tokio::sync::Mutex<JsonStorage>>,
        logs: Arc<LogSink>,
        status: Arc<BotStatus>,
    ) -> Self {
        Self {
            config,
            registry,
            gateway,
            storage,
            logs,
            status,
            message_cooldowns: DashMap::new(),
            button_cooldowns: DashMap::new(),
        }
    }

    fn check_cooldown(
        map: &DashMap<UserId, Instant>,
        user_id: UserId,
        cooldown: std::time::Duration,
    ) -> bool {
        let now = Instant::now();
        // Poda ocasional para que el mapa no crezca sin límite
        if map.len() > 1000 {
            map.retain(|_, last| now.duration_since(*last) < cooldown * 10);
        }

        match map.get(&user_id) {
            Some(last) if now.duration_since(*last) < cooldown => false,
            _ => {
                map.insert(user_id, now);
                true
            }
        }
    }

    pub fn check_message_cooldown(&self, user_id: UserId) -> bool {
        Self::check_cooldown(
            &self.message_cooldowns,
            user_id,
            std::time::Duration::from_secs(self.config.message_cooldown_secs),
        )
    }

    pub fn check_button_cooldown(&self, user_id: UserId) -> bool {
        Self::check_cooldown(
            &self.button_cooldowns,
            user_id,
            std::time::Duration::from_secs(2),
        )
    }

    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                commands::register_guild_commands(ctx, guild_id.into()).await?;
            }
            None => {
                commands::register_global_commands(ctx).await?;
            }
        }
        Ok(())
    }

    /// Petición de música escrita directamente en el canal de la sala
    async fn handle_room_message(&self, ctx: &Context, msg: &Message) {
        let Some(guild_id) = msg.guild_id else { return };
        let Some(orchestrator) = self.registry.get(guild_id) else {
            return;
        };
        let Some(room_channel) = orchestrator.room_channel_id() else {
            return;
        };
        if msg.channel_id != room_channel {
            return;
        }

        // Anti-spam: una petición cada pocos segundos por usuario
        if !self.check_message_cooldown(msg.author.id) {
            let _ = msg.delete(&ctx.http).await;
            return;
        }

        // Con dueño activo, sólo él (o un admin) puede pedir por chat
        if let Some(owner) = orchestrator.owner_id() {
            if owner != msg.author.id && !is_admin_cached(ctx, msg) {
                debug!(
                    "🔒 {} ({}): mensaje de {} eliminado",
                    MusicError::PermissionDenied,
                    guild_id,
                    msg.author.name
                );
                let _ = msg.delete(&ctx.http).await;
                return;
            }
        }

        // El solicitante tiene que estar en el canal de voz de la sala
        let user_channel = handlers::user_voice_channel(ctx, guild_id, msg.author.id);
        let bound = orchestrator.voice_channel_id();
        let in_room_voice = match (user_channel, bound) {
            (Some(user_ch), Some(bound_ch)) => user_ch == bound_ch,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !in_room_voice {
            let embed = embeds::notice_embed(&RoomNotice::PlaybackError {
                message: "debes estar en el canal de voz de la sala".to_string(),
            });
            let _ = msg
                .channel_id
                .send_message(&ctx.http, serenity::builder::CreateMessage::new().embed(embed))
                .await;
            let _ = msg.delete(&ctx.http).await;
            return;
        }

        let query = msg.content.trim().to_string();
        if query.is_empty() {
            let _ = msg.delete(&ctx.http).await;
            return;
        }

        let notice = match orchestrator
            .handle_request(&query, msg.author.id, &msg.author.name)
            .await
        {
            Ok(RequestOutcome::Single { title }) => RoomNotice::TrackAdded { title },
            Ok(RequestOutcome::Playlist { title, count }) => {
                RoomNotice::PlaylistAdded { title, count }
            }
            // Fallos recuperables (resolución, timeout): no se encontró nada
            Err(e) if e.is_recoverable() => RoomNotice::RequestNotFound { query },
            Err(e) => {
                warn!("Petición por chat falló en guild {}: {}", guild_id, e);
                RoomNotice::PlaybackError {
                    message: e.to_string(),
                }
            }
        };

        let embed = embeds::notice_embed(&notice);
        let _ = msg
            .channel_id
            .send_message(&ctx.http, serenity::builder::CreateMessage::new().embed(embed))
            .await;

        let _ = msg.delete(&ctx.http).await;
    }
}

#[async_trait]
impl EventHandler for SalaMusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        // Enlazar el gateway de salas antes de aceptar comandos
        self.gateway.bind(ctx.http.clone(), ctx.cache.clone());

        self.status.set_online(true);
        self.status.set_servers(ready.guilds.len());
        self.logs
            .info(format!("Bot conectado como {}", ready.user.name));

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        // Contadores del dashboard refrescados en segundo plano
        let status = self.status.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let guilds = ctx.cache.guilds();
                let users: usize = guilds
                    .iter()
                    .filter_map(|id| ctx.cache.guild(*id).map(|g| g.member_count as usize))
                    .sum();
                status.set_servers(guilds.len());
                status.set_users(users);
            }
        });
    }

    async fn interaction_create(
        &self,
        ctx: Context,
        interaction: serenity::all::Interaction,
    ) {
        match interaction {
            serenity::all::Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            serenity::all::Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_none() {
            return;
        }
        self.handle_room_message(&ctx, &msg).await;
    }

    /// Detecta la desconexión externa del propio bot: mismo teardown que
    /// `close_room` pero sin re-emitir la desconexión de voz
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id {
            return;
        }

        let was_connected = old.as_ref().and_then(|o| o.channel_id).is_some();
        if was_connected && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                if let Some(orchestrator) = self.registry.get(guild_id) {
                    info!("🔌 Bot sacado del canal de voz en guild {}", guild_id);
                    self.logs
                        .info(format!("Bot desconectado de voz en guild {guild_id}"));
                    orchestrator.handle_external_disconnect().await;
                } else {
                    debug!("Desconexión de voz sin orquestador en guild {}", guild_id);
                }
            }
        }
    }
}

/// Permisos de administrador leídos de la caché del guild
fn is_admin_cached(ctx: &Context, msg: &Message) -> bool {
    let Some(guild_id) = msg.guild_id else {
        return false;
    };
    let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
        return false;
    };
    guild
        .members
        .get(&msg.author.id)
        .map(|member| guild.member_permissions(member).administrator())
        .unwrap_or(false)
}
