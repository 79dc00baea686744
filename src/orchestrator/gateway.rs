use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};

use super::error::MusicError;
use crate::sources::TrackInfo;

/// Avisos que el orquestador publica en el canal de la sala. El adaptador
/// de Discord decide cómo renderizarlos (embeds, colores, auto-borrado).
#[derive(Debug, Clone, PartialEq)]
pub enum RoomNotice {
    RoomCreated { owner: UserId },
    TrackAdded { title: String },
    PlaylistAdded { title: String, count: usize },
    RequestNotFound { query: String },
    QueueFinished,
    InactivityWarning,
    PlaybackError { message: String },
}

/// Efectos secundarios de Discord que necesita el ciclo de vida de la sala.
/// El orquestador sólo conoce este contrato; la implementación con serenity
/// vive en el módulo del bot y los tests usan un doble que cuenta llamadas.
#[async_trait]
pub trait RoomGateway: Send + Sync {
    /// Crea el canal de texto de la sala, visible sólo para los ocupantes
    /// actuales del canal de voz (y el bot)
    async fn create_room_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        voice_channel: ChannelId,
    ) -> Result<ChannelId, MusicError>;

    async fn delete_room_channel(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
    ) -> Result<(), MusicError>;

    /// Concede acceso a la sala a todos los ocupantes no-bot actuales del
    /// canal de voz; devuelve cuántos permisos se actualizaron
    async fn grant_room_access(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        voice_channel: ChannelId,
    ) -> Result<usize, MusicError>;

    /// Ocupantes elegibles para el quórum de voto: no bots, sin self-mute
    /// ni self-deaf. Siempre consultado en vivo, nunca cacheado.
    fn eligible_occupants(&self, guild_id: GuildId, voice_channel: ChannelId) -> usize;

    async fn connect_voice(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
    ) -> Result<(), MusicError>;

    async fn disconnect_voice(&self, guild_id: GuildId) -> Result<(), MusicError>;

    async fn send_notice(
        &self,
        channel: ChannelId,
        notice: RoomNotice,
    ) -> Result<(), MusicError>;

    /// Crea o edita el mensaje persistente de "Now Playing"
    async fn upsert_now_playing(
        &self,
        channel: ChannelId,
        existing: Option<MessageId>,
        track: &TrackInfo,
        requested_by_name: &str,
    ) -> Result<MessageId, MusicError>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId)
        -> Result<(), MusicError>;
}
