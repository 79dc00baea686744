use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::orchestrator::{QueueView, RoomNotice};
use crate::sources::TrackInfo;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_GREEN: Colour = Colour::from_rgb(29, 185, 84);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Sala Music Bot";

/// Embed para un aviso del orquestador en el canal de la sala
pub fn notice_embed(notice: &RoomNotice) -> CreateEmbed {
    match notice {
        RoomNotice::RoomCreated { owner } => CreateEmbed::default()
            .title("🎶 Sala de música creada")
            .description(format!(
                "Dueño: <@{owner}>\nEscribe el nombre de una canción o pega un enlace para pedirla."
            ))
            .color(colors::MUSIC_GREEN)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
        RoomNotice::TrackAdded { title } => CreateEmbed::default()
            .title("Canción añadida")
            .description(format!("✅ **{title}** entró en la cola"))
            .color(colors::SUCCESS_GREEN),
        RoomNotice::PlaylistAdded { title, count } => CreateEmbed::default()
            .title("Playlist añadida")
            .description(format!(
                "✅ **{count}** canciones de **{title}** entraron en la cola"
            ))
            .color(colors::SUCCESS_GREEN),
        RoomNotice::RequestNotFound { query } => CreateEmbed::default()
            .title("Error")
            .description(format!("❌ No se encontró nada para **{query}**"))
            .color(colors::ERROR_RED),
        RoomNotice::QueueFinished => CreateEmbed::default()
            .title("Cola vacía")
            .description(
                "🎶 La cola terminó. El bot saldrá de la sala si no se pide música pronto.",
            )
            .color(colors::WARNING_ORANGE),
        RoomNotice::InactivityWarning => CreateEmbed::default()
            .title("⏰ Aviso")
            .description("El bot saldrá de la sala en 1 minuto si no se reproduce música.")
            .color(colors::WARNING_ORANGE),
        RoomNotice::PlaybackError { message } => CreateEmbed::default()
            .title("Error")
            .description(format!("❌ Fallo de reproducción: {message}"))
            .color(colors::ERROR_RED),
    }
}

/// Embed del mensaje persistente de "Now Playing"
pub fn now_playing_embed(track: &TrackInfo, requested_by_name: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("[{}]({})", track.title, track.page_url))
        .color(colors::INFO_BLUE)
        .field("⏱️ Duración", format_track_duration(track), true)
        .field("👤 Pedida por", requested_by_name.to_string(), true);

    if let Some(thumbnail) = &track.thumbnail_url {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con el listado de la cola
pub fn queue_embed(view: &QueueView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de música")
        .color(colors::MUSIC_GREEN);

    let mut description = String::new();

    if let Some(current) = &view.current {
        description.push_str(&format!("▶️ **{}**\n\n", current.title));
    }

    if view.entries.is_empty() {
        if view.current.is_none() {
            description.push_str("❌ La cola está vacía. ¡Pide la primera canción!");
            embed = embed.color(colors::WARNING_ORANGE);
        }
    } else {
        for (i, entry) in view.entries.iter().take(10).enumerate() {
            let label = entry
                .resolved
                .as_ref()
                .map(|t| t.title.as_str())
                .unwrap_or(entry.query.as_str());
            description.push_str(&format!("**{}.** {}\n", i + 1, label));
        }
        if view.entries.len() > 10 {
            description.push_str(&format!("...y {} más\n", view.entries.len() - 10));
        }
    }

    let mut flags = Vec::new();
    if view.loop_enabled {
        flags.push("🔁 loop");
    }
    if view.auto_play_enabled {
        flags.push("🤖 autoplay");
    }
    if let Some(filter) = view.selected_filter {
        match filter {
            crate::audio::AudioFilter::Bass => flags.push("🎛️ bass"),
            crate::audio::AudioFilter::Nightcore => flags.push("🎛️ nightcore"),
            crate::audio::AudioFilter::Pitch => flags.push("🎛️ pitch"),
        }
    }

    let footer = if flags.is_empty() {
        "Usa /remove [n] para quitar una canción".to_string()
    } else {
        format!("{} | /remove [n] para quitar", flags.join(" "))
    };

    embed.description(description).footer(CreateEmbedFooter::new(footer))
}

/// Embed de ayuda con todos los comandos
pub fn help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎶 Sala Music Bot")
        .description("Comandos para controlar el bot de música:")
        .color(colors::MUSIC_GREEN)
        .field("/join", "Entra al canal de voz y crea la sala de música", false)
        .field("/play [canción/URL]", "Añade una canción o playlist a la cola", false)
        .field("/queue", "Muestra la cola actual", false)
        .field("/remove [n]", "Quita la canción n de la cola", false)
        .field("/shuffle", "Mezcla la cola", false)
        .field("/loop", "Repite la cola al terminar", false)
        .field("/autoplay", "Música automática cuando la cola se vacía", false)
        .field("/filter [nombre]", "bass, nightcore, pitch o none", false)
        .field("/voteskip", "Vota por saltar la canción actual", false)
        .field("/sync_permissions", "Da acceso a la sala a todos en el canal de voz", false)
        .field("/playlist_save [nombre]", "Guarda la cola como playlist", false)
        .field("/playlist_load [nombre]", "Carga una playlist guardada", false)
        .field("/leave", "Cierra la sala", false)
        .field(
            "En la sala",
            "Escribe el nombre de una canción o pega un enlace para pedirla",
            false,
        )
        .footer(CreateEmbedFooter::new(
            "Más controles en los botones del mensaje Now Playing",
        ))
}

fn format_track_duration(track: &TrackInfo) -> String {
    if track.duration_seconds == 0 {
        "🔴 En vivo".to_string()
    } else {
        format_duration(Duration::from_secs(track.duration_seconds))
    }
}

/// Formatea una duración como m:ss o h:mm:ss
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(185)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }
}
