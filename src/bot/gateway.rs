use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serenity::{
    all::{ChannelType, PermissionOverwrite, PermissionOverwriteType, Permissions},
    builder::{CreateChannel, CreateMessage, EditMessage},
    cache::Cache,
    http::Http,
    model::id::{ChannelId, GuildId, MessageId, RoleId, UserId},
};
use songbird::Songbird;
use tracing::{debug, info, warn};

use crate::orchestrator::{MusicError, RoomGateway, RoomNotice};
use crate::sources::TrackInfo;
use crate::ui::{buttons, embeds};

/// Implementación con serenity del contrato de efectos de sala. El contexto
/// HTTP/caché se enlaza en el evento `ready`, antes de abrir ninguna sala.
pub struct SerenityGateway {
    songbird: Arc<Songbird>,
    context: OnceLock<(Arc<Http>, Arc<Cache>)>,
}

impl SerenityGateway {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self {
            songbird,
            context: OnceLock::new(),
        }
    }

    /// Enlaza HTTP y caché del cliente; llamado una vez desde `ready`
    pub fn bind(&self, http: Arc<Http>, cache: Arc<Cache>) {
        if self.context.set((http, cache)).is_ok() {
            debug!("🔗 Gateway de salas enlazado al cliente");
        }
    }

    fn http(&self) -> Result<&Arc<Http>, MusicError> {
        self.context
            .get()
            .map(|(http, _)| http)
            .ok_or_else(|| MusicError::Discord("gateway sin enlazar".to_string()))
    }

    fn cache(&self) -> Result<&Arc<Cache>, MusicError> {
        self.context
            .get()
            .map(|(_, cache)| cache)
            .ok_or_else(|| MusicError::Discord("gateway sin enlazar".to_string()))
    }

    /// Ocupantes no-bot del canal de voz, leídos de la caché
    fn occupants(&self, guild_id: GuildId, voice_channel: ChannelId) -> Vec<UserId> {
        let Ok(cache) = self.cache() else {
            return Vec::new();
        };
        let Some(guild) = cache.guild(guild_id) else {
            return Vec::new();
        };
        guild
            .voice_states
            .iter()
            .filter(|(_, vs)| vs.channel_id == Some(voice_channel))
            .filter(|(_, vs)| !vs.member.as_ref().map(|m| m.user.bot).unwrap_or(false))
            .map(|(user_id, _)| *user_id)
            .collect()
    }

    fn room_overwrites(
        &self,
        guild_id: GuildId,
        occupants: &[UserId],
        bot_user: UserId,
    ) -> Vec<PermissionOverwrite> {
        let member_allow = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;

        let mut overwrites = vec![
            // El canal no es visible para el resto del servidor
            PermissionOverwrite {
                allow: Permissions::empty(),
                deny: Permissions::VIEW_CHANNEL
                    | Permissions::SEND_MESSAGES
                    | Permissions::MENTION_EVERYONE,
                kind: PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
            },
            PermissionOverwrite {
                allow: member_allow,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Member(bot_user),
            },
        ];

        for user_id in occupants {
            overwrites.push(PermissionOverwrite {
                allow: member_allow,
                deny: Permissions::MENTION_EVERYONE,
                kind: PermissionOverwriteType::Member(*user_id),
            });
        }

        overwrites
    }
}

#[async_trait]
impl RoomGateway for SerenityGateway {
    async fn create_room_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        voice_channel: ChannelId,
    ) -> Result<ChannelId, MusicError> {
        let (category, bot_user) = {
            let cache = self.cache()?;
            let category = cache
                .guild(guild_id)
                .and_then(|g| g.channels.get(&voice_channel).and_then(|ch| ch.parent_id));
            (category, cache.current_user().id)
        };

        let occupants = self.occupants(guild_id, voice_channel);
        let overwrites = self.room_overwrites(guild_id, &occupants, bot_user);

        let mut builder = CreateChannel::new(name)
            .kind(ChannelType::Text)
            .permissions(overwrites);
        if let Some(category) = category {
            builder = builder.category(category);
        }

        let channel = guild_id
            .create_channel(self.http()?, builder)
            .await
            .map_err(|e| MusicError::Discord(format!("no se pudo crear el canal: {e}")))?;

        info!(
            "📺 Canal de sala #{} creado en guild {} ({} ocupantes)",
            channel.name, guild_id, occupants.len()
        );
        Ok(channel.id)
    }

    async fn delete_room_channel(
        &self,
        _guild_id: GuildId,
        channel: ChannelId,
    ) -> Result<(), MusicError> {
        channel
            .delete(self.http()?)
            .await
            .map_err(|_| MusicError::ChannelMissing)?;
        Ok(())
    }

    async fn grant_room_access(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        voice_channel: ChannelId,
    ) -> Result<usize, MusicError> {
        let occupants = self.occupants(guild_id, voice_channel);
        let http = self.http()?.clone();
        let mut updated = 0;

        for user_id in occupants {
            let overwrite = PermissionOverwrite {
                allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
                deny: Permissions::MENTION_EVERYONE,
                kind: PermissionOverwriteType::Member(user_id),
            };
            match channel.create_permission(&http, overwrite).await {
                Ok(()) => updated += 1,
                Err(e) => warn!("No se pudo dar acceso a {}: {}", user_id, e),
            }
        }

        Ok(updated)
    }

    fn eligible_occupants(&self, guild_id: GuildId, voice_channel: ChannelId) -> usize {
        let Ok(cache) = self.cache() else {
            return 0;
        };
        let Some(guild) = cache.guild(guild_id) else {
            return 0;
        };
        guild
            .voice_states
            .iter()
            .filter(|(_, vs)| vs.channel_id == Some(voice_channel))
            .filter(|(_, vs)| !vs.member.as_ref().map(|m| m.user.bot).unwrap_or(false))
            .filter(|(_, vs)| !vs.self_mute && !vs.self_deaf)
            .count()
    }

    async fn connect_voice(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
    ) -> Result<(), MusicError> {
        let call = self
            .songbird
            .join(guild_id, voice_channel)
            .await
            .map_err(|e| MusicError::Discord(format!("no se pudo conectar a voz: {e}")))?;

        // El bot no necesita escuchar; ensordecerse ahorra ancho de banda
        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                debug!("No se pudo ensordecer al bot: {e}");
            }
        }

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(())
    }

    async fn disconnect_voice(&self, guild_id: GuildId) -> Result<(), MusicError> {
        self.songbird
            .remove(guild_id)
            .await
            .map_err(|e| MusicError::Discord(format!("no se pudo desconectar: {e}")))?;
        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }

    async fn send_notice(
        &self,
        channel: ChannelId,
        notice: RoomNotice,
    ) -> Result<(), MusicError> {
        let embed = embeds::notice_embed(&notice);
        channel
            .send_message(self.http()?, CreateMessage::new().embed(embed))
            .await
            .map_err(|_| MusicError::ChannelMissing)?;
        Ok(())
    }

    async fn upsert_now_playing(
        &self,
        channel: ChannelId,
        existing: Option<MessageId>,
        track: &TrackInfo,
        requested_by_name: &str,
    ) -> Result<MessageId, MusicError> {
        let http = self.http()?;
        let embed = embeds::now_playing_embed(track, requested_by_name);
        let controls = buttons::player_controls();

        if let Some(message_id) = existing {
            let edit = EditMessage::new().embed(embed.clone()).components(controls.clone());
            match channel.edit_message(http, message_id, edit).await {
                Ok(_) => return Ok(message_id),
                // El mensaje pudo borrarse a mano; se crea uno nuevo
                Err(e) => debug!("Now Playing no editable ({e}); creando uno nuevo"),
            }
        }

        let message = channel
            .send_message(http, CreateMessage::new().embed(embed).components(controls))
            .await
            .map_err(|_| MusicError::ChannelMissing)?;
        Ok(message.id)
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), MusicError> {
        channel
            .delete_message(self.http()?, message)
            .await
            .map_err(|_| MusicError::ChannelMissing)?;
        Ok(())
    }
}
