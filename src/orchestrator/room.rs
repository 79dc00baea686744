use serenity::model::id::{ChannelId, UserId};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{GuildOrchestrator, MusicError, PlayState, RoomNotice};

/// Resultado de abrir (o re-entrar a) una sala.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Created(ChannelId),
    Rejoined(ChannelId),
}

impl GuildOrchestrator {
    /// Abre la sala: conecta la voz y crea (o reutiliza) el canal de texto
    /// privado. El primer usuario se convierte en dueño; otro usuario sólo
    /// puede tomar la sala si es administrador.
    pub async fn open_room(
        &self,
        user: UserId,
        user_name: &str,
        voice_channel: ChannelId,
        is_admin: bool,
    ) -> Result<OpenOutcome, MusicError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(MusicError::NoRoom);
            }
            match state.owner_id {
                Some(owner) if owner != user => {
                    if !is_admin {
                        return Err(MusicError::RoomOwned(owner));
                    }
                    // Toma de la sala por administrador
                    info!(
                        "👑 Admin {} toma la sala de {} en guild {}",
                        user, owner, self.guild_id
                    );
                    state.owner_id = Some(user);
                }
                Some(_) => {}
                None => state.owner_id = Some(user),
            }
            state.voice_channel_id = Some(voice_channel);
        }

        self.gateway
            .connect_voice(self.guild_id, voice_channel)
            .await?;

        let existing = self.state.lock().room_channel_id;
        match existing {
            Some(channel) => {
                // Re-entrada: la sala ya existe, refrescar accesos
                if let Err(e) = self
                    .gateway
                    .grant_room_access(self.guild_id, channel, voice_channel)
                    .await
                {
                    warn!("No se pudieron refrescar los permisos de la sala: {e}");
                }
                Ok(OpenOutcome::Rejoined(channel))
            }
            None => {
                let name = room_channel_name(user_name);
                let channel = self
                    .gateway
                    .create_room_channel(self.guild_id, &name, voice_channel)
                    .await?;

                // Filtro por defecto configurado para el servidor, si lo hay
                let settings = {
                    let storage = self.storage.lock().await;
                    storage.get_guild_settings(self.guild_id)
                };
                let default_filter = settings
                    .default_filter
                    .as_deref()
                    .and_then(|name| crate::audio::AudioFilter::parse_selection(name).ok())
                    .flatten();

                {
                    let mut state = self.state.lock();
                    state.room_channel_id = Some(channel);
                    state.selected_filter = default_filter;
                    state.last_activity_at = Instant::now();
                    state.inactivity_warning_sent = false;
                }

                let _ = self
                    .gateway
                    .send_notice(channel, RoomNotice::RoomCreated { owner: user })
                    .await;

                self.logs
                    .info(format!("Sala de música abierta en guild {}", self.guild_id));
                Ok(OpenOutcome::Created(channel))
            }
        }
    }

    /// Sincroniza los permisos del canal de la sala con los ocupantes del
    /// canal de voz. Con rate limit por guild para acotar el coste.
    pub async fn sync_permissions(&self) -> Result<usize, MusicError> {
        let (channel, voice_channel) = {
            let mut state = self.state.lock();
            let channel = state.room_channel_id.ok_or(MusicError::NoRoom)?;
            let voice_channel = state.voice_channel_id.ok_or(MusicError::NoVoiceChannel)?;

            if let Some(last) = state.last_permission_sync {
                let elapsed = last.elapsed();
                if elapsed < self.timings.sync_cooldown {
                    let remaining = (self.timings.sync_cooldown - elapsed).as_secs().max(1);
                    return Err(MusicError::RateLimited(remaining));
                }
            }
            // Registrado antes de suspender: dos llamadas concurrentes no
            // pasan las dos el rate limit
            state.last_permission_sync = Some(Instant::now());
            (channel, voice_channel)
        };

        self.gateway
            .grant_room_access(self.guild_id, channel, voice_channel)
            .await
    }

    /// Cierra la sala: voz, canal de texto, mensaje persistente y estado.
    /// Seguro de llamar dos veces.
    pub async fn close_room(&self) {
        self.teardown(true).await;
    }

    /// La conexión de voz cayó sin pasar por `close_room` (p. ej. el bot fue
    /// expulsado a mano): mismo teardown pero sin re-emitir la desconexión.
    pub async fn handle_external_disconnect(&self) {
        info!(
            "🔌 Desconexión externa de voz en guild {}; limpiando sala",
            self.guild_id
        );
        self.teardown(false).await;
    }

    async fn teardown(&self, disconnect_voice: bool) {
        let (room_channel, now_playing) = {
            let mut state = self.state.lock();
            if state.closed {
                debug!("Teardown repetido en guild {}; ignorado", self.guild_id);
                return;
            }
            state.closed = true;
            (state.room_channel_id, state.now_playing_msg)
        };

        // El cerrojo de arriba garantiza una única cancelación
        self.watchdog_token.cancel();

        self.transport.stop(self.guild_id).await;
        self.transport.unsubscribe(self.guild_id);

        if disconnect_voice {
            if let Err(e) = self.gateway.disconnect_voice(self.guild_id).await {
                error!("Error desconectando voz en guild {}: {}", self.guild_id, e);
            }
        }

        if let Some(channel) = room_channel {
            if let Some(message) = now_playing {
                if let Err(e) = self.gateway.delete_message(channel, message).await {
                    debug!("No se pudo borrar el mensaje de Now Playing: {e}");
                }
            }
            if let Err(e) = self
                .gateway
                .delete_room_channel(self.guild_id, channel)
                .await
            {
                error!("Error borrando el canal de la sala: {e}");
            }
        }

        self.state.lock().reset();

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.guild_id);
        }

        self.logs
            .info(format!("Sala cerrada en guild {}", self.guild_id));
        info!("🧹 Sala limpiada en guild {}", self.guild_id);
    }

    /// Vigilante de inactividad: tarea periódica propia del orquestador,
    /// arrancada al crearlo y cancelada exactamente una vez en el teardown.
    pub(crate) fn spawn_watchdog(self: &std::sync::Arc<Self>) {
        let weak = std::sync::Arc::downgrade(self);
        let token = self.watchdog_token.clone();
        let interval = self.timings.watchdog_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(orchestrator) = weak.upgrade() else { break };
                        orchestrator.watchdog_tick().await;
                    }
                }
            }
            debug!("⏱️ Watchdog terminado");
        });
    }

    async fn watchdog_tick(&self) {
        let (idle_for, warn_now, room_channel) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            // El contador sólo corre sin música y con la cola vacía
            if state.current_track.is_some()
                || !state.queue.is_empty()
                || state.play_state != PlayState::Idle
            {
                state.inactivity_warning_sent = false;
                return;
            }

            let idle_for = state.last_activity_at.elapsed();
            let warn_threshold = self
                .timings
                .inactivity_timeout
                .saturating_sub(self.timings.warning_window);
            let warn_now = idle_for >= warn_threshold
                && idle_for < self.timings.inactivity_timeout
                && !state.inactivity_warning_sent;
            if warn_now {
                // Marcado antes de suspender: exactamente un aviso por periodo
                state.inactivity_warning_sent = true;
            }
            (idle_for, warn_now, state.room_channel_id)
        };

        if warn_now {
            info!(
                "⏰ Aviso de inactividad en guild {} ({}s ociosos)",
                self.guild_id,
                idle_for.as_secs()
            );
            if let Some(channel) = room_channel {
                let _ = self
                    .gateway
                    .send_notice(channel, RoomNotice::InactivityWarning)
                    .await;
            }
        }

        if idle_for >= self.timings.inactivity_timeout {
            info!(
                "⏰ Timeout de inactividad ({}s) en guild {}; cerrando sala",
                self.timings.inactivity_timeout.as_secs(),
                self.guild_id
            );
            self.logs.info(format!(
                "Sala cerrada por inactividad en guild {}",
                self.guild_id
            ));
            self.close_room().await;
        }
    }
}

/// Nombre del canal de la sala a partir del nombre del dueño
fn room_channel_name(user_name: &str) -> String {
    let slug: String = user_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    format!("{slug}-music-room")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_room_channel_name_slug() {
        assert_eq!(room_channel_name("DJ Ambar"), "dj-ambar-music-room");
        assert_eq!(room_channel_name("luna"), "luna-music-room");
    }
}
