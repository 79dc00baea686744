use std::sync::Arc;

use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    bot::SalaMusicBot,
    orchestrator::{GuildOrchestrator, MusicError, OpenOutcome, RequestOutcome},
    sources::QueueEntry,
    storage::StoredTrack,
    ui::{buttons::button_ids, buttons, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "join" => handle_join(ctx, command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, command, bot, guild_id).await?,
        "shuffle" => handle_shuffle(ctx, command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, command, bot, guild_id).await?,
        "autoplay" => handle_autoplay(ctx, command, bot, guild_id).await?,
        "filter" => handle_filter(ctx, command, bot, guild_id).await?,
        "sync_permissions" => handle_sync_permissions(ctx, command, bot, guild_id).await?,
        "voteskip" => handle_voteskip(ctx, command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot, guild_id).await?,
        "playlist_save" => handle_playlist_save(ctx, command, bot, guild_id).await?,
        "playlist_load" => handle_playlist_load(ctx, command, bot, guild_id).await?,
        "playlist_list" => handle_playlist_list(ctx, command, bot, guild_id).await?,
        "playlist_delete" => handle_playlist_delete(ctx, command, bot, guild_id).await?,
        "help" => {
            respond_embed(ctx, &command, embeds::help_embed()).await?;
        }
        _ => {
            respond_text(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, &command).await?;

    let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return followup_text(ctx, &command, "❌ Debes estar en un canal de voz primero").await;
    };

    let orchestrator = bot.registry.get_or_create(guild_id);
    let outcome = orchestrator
        .open_room(
            command.user.id,
            &command.user.name,
            voice_channel,
            is_admin(&command),
        )
        .await;

    match outcome {
        Ok(OpenOutcome::Created(channel)) => {
            followup_text(
                ctx,
                &command,
                &format!("✅ Sala creada: <#{channel}>. ¡Pide tu primera canción ahí!"),
            )
            .await
        }
        Ok(OpenOutcome::Rejoined(channel)) => {
            followup_text(ctx, &command, &format!("✅ De vuelta en <#{channel}>")).await
        }
        Err(MusicError::RoomOwned(owner)) => {
            followup_text(
                ctx,
                &command,
                &format!("❌ La sala ya fue creada por <@{owner}>"),
            )
            .await
        }
        Err(e) => followup_text(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, &command).await?;

    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return followup_text(ctx, &command, "❌ No hay ninguna sala abierta").await;
    };

    if let Err(message) = same_voice_guard(ctx, &orchestrator, guild_id, command.user.id) {
        return followup_text(ctx, &command, &message).await;
    }

    orchestrator.close_room().await;
    followup_text(ctx, &command, "🚪 Sala cerrada. ¡Hasta la próxima!").await
}

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, &command).await?;

    let Some(query) = option_str(&command, "query").map(str::to_string) else {
        return followup_text(ctx, &command, "❌ Falta la canción a buscar").await;
    };

    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return followup_text(ctx, &command, "❌ No hay sala abierta. Usa /join primero").await;
    };

    if let Err(message) = same_voice_guard(ctx, &orchestrator, guild_id, command.user.id) {
        return followup_text(ctx, &command, &message).await;
    }

    // El comando sólo funciona dentro del canal de la sala
    if let Some(room_channel) = orchestrator.room_channel_id() {
        if command.channel_id != room_channel {
            return followup_text(
                ctx,
                &command,
                &format!("❌ Usa este comando en la sala <#{room_channel}>"),
            )
            .await;
        }
    }

    match orchestrator
        .handle_request(&query, command.user.id, &command.user.name)
        .await
    {
        Ok(RequestOutcome::Single { title }) => {
            followup_text(ctx, &command, &format!("✅ **{title}** entró en la cola")).await
        }
        Ok(RequestOutcome::Playlist { title, count }) => {
            followup_text(
                ctx,
                &command,
                &format!("✅ **{count}** canciones de **{title}** entraron en la cola"),
            )
            .await
        }
        Err(MusicError::Resolution(query)) => {
            followup_text(ctx, &command, &format!("❌ No se encontró nada para **{query}**")).await
        }
        Err(e) => followup_text(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay ninguna sala abierta").await;
    };

    respond_embed(ctx, &command, embeds::queue_embed(&orchestrator.queue_view())).await
}

async fn handle_remove(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    let index = option_int(&command, "index").unwrap_or(0).max(0) as usize;
    match orchestrator.remove_from_queue(index) {
        Some(entry) => {
            let label = entry
                .resolved
                .map(|t| t.title)
                .unwrap_or(entry.query);
            respond_text(
                ctx,
                &command,
                &format!("✅ **{label}** (posición {index}) fuera de la cola"),
            )
            .await
        }
        None => {
            respond_text(ctx, &command, &format!("❌ No hay canción en la posición {index}")).await
        }
    }
}

async fn handle_shuffle(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    if orchestrator.shuffle_queue() {
        respond_text(ctx, &command, "🔀 Cola mezclada").await
    } else {
        respond_text(ctx, &command, "❌ Hacen falta al menos 2 canciones para mezclar").await
    }
}

async fn handle_loop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    let enabled = orchestrator.toggle_loop();
    let text = if enabled {
        "🔁 Repetición de cola: **activada**"
    } else {
        "➡️ Repetición de cola: **desactivada**"
    };
    respond_text(ctx, &command, text).await
}

async fn handle_autoplay(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    let enabled = orchestrator.toggle_auto_play();
    let text = if enabled {
        "🤖 Auto Play: **activado**"
    } else {
        "🤖 Auto Play: **desactivado**"
    };
    respond_text(ctx, &command, text).await
}

async fn handle_filter(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    let name = option_str(&command, "name").unwrap_or("none");
    match orchestrator.set_filter(name) {
        Ok(Some(filter)) => {
            respond_text(
                ctx,
                &command,
                &format!(
                    "✅ Filtro **{}** activado; se aplicará a la siguiente canción",
                    filter.as_str()
                ),
            )
            .await
        }
        Ok(None) => respond_text(ctx, &command, "✅ Filtro desactivado").await,
        Err(e) => respond_text(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_sync_permissions(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, &command).await?;

    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return followup_text(ctx, &command, "❌ No hay sala abierta. Usa /join primero").await;
    };

    if let Err(message) = same_voice_guard(ctx, &orchestrator, guild_id, command.user.id) {
        return followup_text(ctx, &command, &message).await;
    }

    match orchestrator.sync_permissions().await {
        Ok(updated) => {
            followup_text(
                ctx,
                &command,
                &format!("✅ Permisos actualizados para {updated} personas"),
            )
            .await
        }
        Err(MusicError::RateLimited(seconds)) => {
            followup_text(
                ctx,
                &command,
                &format!("⏳ Espera {seconds} segundos antes de sincronizar de nuevo"),
            )
            .await
        }
        Err(e) => followup_text(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_voteskip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    if orchestrator.current_track().is_none() {
        return respond_text(ctx, &command, "❌ No hay ninguna canción sonando").await;
    }

    let vote = orchestrator.request_vote_skip(command.user.id);
    if vote.passed {
        orchestrator.skip().await;
        respond_public(ctx, &command, "⏭️ Quórum alcanzado, canción saltada").await
    } else {
        respond_public(
            ctx,
            &command,
            &format!("🗳️ Votos para saltar: **{}/{}**", vote.votes, vote.required),
        )
        .await
    }
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    if orchestrator.pause().await {
        respond_text(ctx, &command, "⏸️ Reproducción pausada").await
    } else {
        respond_text(ctx, &command, "❌ No hay nada reproduciéndose").await
    }
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    if orchestrator.resume().await {
        respond_text(ctx, &command, "▶️ Reproducción reanudada").await
    } else {
        respond_text(ctx, &command, "❌ No hay nada pausado").await
    }
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, &command).await?;

    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return followup_text(ctx, &command, "❌ No hay ninguna sala abierta").await;
    };

    if let Err(message) = same_voice_guard(ctx, &orchestrator, guild_id, command.user.id) {
        return followup_text(ctx, &command, &message).await;
    }

    if orchestrator.skip().await {
        followup_text(ctx, &command, "⏭️ Canción saltada").await
    } else {
        followup_text(ctx, &command, "❌ No hay nada que saltar").await
    }
}

async fn handle_volume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = require_room_in_voice(ctx, &command, bot, guild_id).await? else {
        return Ok(());
    };

    let level = option_int(&command, "level").unwrap_or(100).clamp(0, 200) as u8;
    orchestrator.set_volume(level).await;
    respond_text(ctx, &command, &format!("🔊 Volumen ajustado a {level}%")).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay ninguna sala abierta").await;
    };

    match orchestrator.current_track() {
        Some(track) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::now_playing_embed(&track, "la sala"))
                            .components(buttons::player_controls())
                            .ephemeral(true),
                    ),
                )
                .await?;
            Ok(())
        }
        None => respond_text(ctx, &command, "❌ No hay nada reproduciéndose ahora").await,
    }
}

async fn handle_playlist_save(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(name) = option_str(&command, "name").map(str::to_string) else {
        return respond_text(ctx, &command, "❌ Falta el nombre de la playlist").await;
    };

    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No hay ninguna sala abierta").await;
    };

    let view = orchestrator.queue_view();
    let mut tracks: Vec<StoredTrack> = Vec::new();
    if let Some(current) = &view.current {
        tracks.push(StoredTrack::from(current));
    }
    tracks.extend(
        view.entries
            .iter()
            .filter_map(|e| e.resolved.as_ref())
            .map(StoredTrack::from),
    );

    if tracks.is_empty() {
        return respond_text(ctx, &command, "❌ No hay canciones que guardar").await;
    }

    let count = tracks.len();
    let saved = {
        let mut storage = bot.storage.lock().await;
        storage
            .save_playlist(guild_id, command.user.id, &name, tracks)
            .await
    };

    if saved {
        respond_text(
            ctx,
            &command,
            &format!("💾 Playlist **{name}** guardada con {count} canciones"),
        )
        .await
    } else {
        respond_text(ctx, &command, "❌ No se pudo guardar la playlist").await
    }
}

async fn handle_playlist_load(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, &command).await?;

    let Some(name) = option_str(&command, "name").map(str::to_string) else {
        return followup_text(ctx, &command, "❌ Falta el nombre de la playlist").await;
    };

    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return followup_text(ctx, &command, "❌ No hay sala abierta. Usa /join primero").await;
    };

    if let Err(message) = same_voice_guard(ctx, &orchestrator, guild_id, command.user.id) {
        return followup_text(ctx, &command, &message).await;
    }

    let tracks = {
        let storage = bot.storage.lock().await;
        storage.load_playlist(guild_id, command.user.id, &name)
    };

    match tracks {
        Some(tracks) if !tracks.is_empty() => {
            let count = tracks.len();
            let entries: Vec<QueueEntry> = tracks
                .into_iter()
                .map(|t| QueueEntry::new(t.page_url, command.user.id, command.user.name.clone()))
                .collect();
            orchestrator.add_to_queue(entries);
            orchestrator.play_if_idle().await;
            followup_text(
                ctx,
                &command,
                &format!("✅ **{count}** canciones de **{name}** entraron en la cola"),
            )
            .await
        }
        _ => followup_text(ctx, &command, &format!("❌ No tienes una playlist **{name}**")).await,
    }
}

async fn handle_playlist_list(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let names = {
        let storage = bot.storage.lock().await;
        storage.list_playlists(guild_id, command.user.id)
    };

    if names.is_empty() {
        respond_text(ctx, &command, "❌ No tienes playlists guardadas").await
    } else {
        let listado: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("**{}.** {n}", i + 1))
            .collect();
        respond_text(
            ctx,
            &command,
            &format!("📚 Tus playlists:\n{}", listado.join("\n")),
        )
        .await
    }
}

async fn handle_playlist_delete(
    ctx: &Context,
    command: CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(name) = option_str(&command, "name").map(str::to_string) else {
        return respond_text(ctx, &command, "❌ Falta el nombre de la playlist").await;
    };

    let deleted = {
        let mut storage = bot.storage.lock().await;
        storage
            .delete_playlist(guild_id, command.user.id, &name)
            .await
    };

    if deleted {
        respond_text(ctx, &command, &format!("🗑️ Playlist **{name}** borrada")).await
    } else {
        respond_text(ctx, &command, &format!("❌ No tienes una playlist **{name}**")).await
    }
}

/// Maneja interacciones con los botones del mensaje Now Playing
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &SalaMusicBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} pulsado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(orchestrator) = bot.registry.get(guild_id) else {
        return component_reply(ctx, &component, "❌ La sala ya no existe").await;
    };

    if !bot.check_button_cooldown(component.user.id) {
        return component_reply(ctx, &component, "⏳ Espera un momento entre pulsaciones").await;
    }

    if let Err(message) = same_voice_guard(ctx, &orchestrator, guild_id, component.user.id) {
        return component_reply(ctx, &component, &message).await;
    }

    match component.data.custom_id.as_str() {
        button_ids::PAUSE => {
            let text = if orchestrator.pause().await {
                "⏸️ Pausado"
            } else {
                "❌ No hay nada reproduciéndose"
            };
            component_reply(ctx, &component, text).await
        }
        button_ids::RESUME => {
            let text = if orchestrator.resume().await {
                "▶️ Reanudado"
            } else {
                "❌ No hay nada pausado"
            };
            component_reply(ctx, &component, text).await
        }
        button_ids::SKIP => {
            let text = if orchestrator.skip().await {
                "⏭️ Canción saltada"
            } else {
                "❌ No hay nada que saltar"
            };
            component_reply(ctx, &component, text).await
        }
        button_ids::VOLUME_DOWN => adjust_volume(ctx, &component, &orchestrator, -10).await,
        button_ids::VOLUME_UP => adjust_volume(ctx, &component, &orchestrator, 10).await,
        button_ids::LEAVE => {
            orchestrator.close_room().await;
            component_reply(ctx, &component, "🚪 Sala cerrada").await
        }
        _ => component_reply(ctx, &component, "❌ Acción no reconocida").await,
    }
}

async fn adjust_volume(
    ctx: &Context,
    component: &ComponentInteraction,
    orchestrator: &Arc<GuildOrchestrator>,
    delta: i16,
) -> Result<()> {
    let Some(current) = orchestrator.volume_percent().await else {
        return component_reply(ctx, component, "❌ No hay nada reproduciéndose").await;
    };

    let target = (i16::from(current) + delta).clamp(0, 200) as u8;
    orchestrator.set_volume(target).await;
    component_reply(ctx, component, &format!("🔊 Volumen: **{target}%**")).await
}

// Guards y funciones auxiliares

/// Guard combinado para comandos simples: sala abierta + usuario en el mismo
/// canal de voz que el bot. Responde al usuario cuando falla.
async fn require_room_in_voice(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &SalaMusicBot,
    guild_id: GuildId,
) -> Result<Option<Arc<GuildOrchestrator>>> {
    let Some(orchestrator) = bot.registry.get(guild_id) else {
        respond_text(ctx, command, "❌ No hay sala abierta. Usa /join primero").await?;
        return Ok(None);
    };

    if let Err(message) = same_voice_guard(ctx, &orchestrator, guild_id, command.user.id) {
        respond_text(ctx, command, &message).await?;
        return Ok(None);
    }

    Ok(Some(orchestrator))
}

/// El usuario debe estar en el canal de voz al que está enlazada la sala
fn same_voice_guard(
    ctx: &Context,
    orchestrator: &Arc<GuildOrchestrator>,
    guild_id: GuildId,
    user_id: UserId,
) -> std::result::Result<(), String> {
    let Some(user_channel) = user_voice_channel(ctx, guild_id, user_id) else {
        return Err("❌ Debes estar en un canal de voz".to_string());
    };

    match orchestrator.voice_channel_id() {
        Some(bound) if bound != user_channel => {
            Err("❌ Debes estar en el mismo canal de voz que el bot".to_string())
        }
        _ => Ok(()),
    }
}

pub(crate) fn user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

/// Permisos de administrador del miembro que lanzó la interacción
fn is_admin(command: &CommandInteraction) -> bool {
    command
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.administrator())
        .unwrap_or(false)
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_int(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_text(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Respuesta visible para toda la sala (votos de skip)
async fn respond_public(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: serenity::builder::CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn followup_text(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await?;
    Ok(())
}

async fn component_reply(
    ctx: &Context,
    component: &ComponentInteraction,
    text: &str,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
