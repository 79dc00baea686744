pub mod voice;

use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::str::FromStr;

use crate::sources::TrackInfo;

pub use voice::VoiceTransport;

/// Filtro de audio aplicado a los parámetros iniciales del siguiente track.
/// Nunca se aplica en caliente sobre el stream activo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFilter {
    Bass,
    Nightcore,
    Pitch,
}

impl AudioFilter {
    /// Cadena de filtro para el flag `-af` de FFmpeg
    pub fn ffmpeg_filter(&self) -> &'static str {
        match self {
            AudioFilter::Bass => "bass=g=10",
            AudioFilter::Nightcore => "asetrate=44100*1.25,aresample=44100,atempo=1.1",
            AudioFilter::Pitch => "asetrate=44100*1.15,aresample=44100",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFilter::Bass => "bass",
            AudioFilter::Nightcore => "nightcore",
            AudioFilter::Pitch => "pitch",
        }
    }

    /// Valida un nombre contra el conjunto permitido. `"none"` limpia el
    /// filtro; cualquier otro nombre desconocido se rechaza.
    pub fn parse_selection(name: &str) -> Result<Option<AudioFilter>, UnknownFilter> {
        if name.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        AudioFilter::from_str(name).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("filtro desconocido: {0}")]
pub struct UnknownFilter(pub String);

impl FromStr for AudioFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bass" => Ok(AudioFilter::Bass),
            "nightcore" => Ok(AudioFilter::Nightcore),
            "pitch" => Ok(AudioFilter::Pitch),
            other => Err(UnknownFilter(other.to_string())),
        }
    }
}

/// Parámetros iniciales de reproducción de un track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    /// Ganancia inicial (0.0 - 2.0). El sequencer arranca en 0 para el fade in.
    pub volume: f32,
    pub filter: Option<AudioFilter>,
}

/// Señal del transporte hacia el sequencer al terminar un track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Finished,
    Errored,
}

/// Capacidad de transporte de audio. La implementación real vive en
/// [`voice::VoiceTransport`]; los tests usan un doble que graba llamadas.
#[async_trait]
pub trait PlaybackTransport: Send + Sync {
    /// Inicia la reproducción de un track. El evento de finalización llega
    /// por el canal registrado con [`subscribe`](Self::subscribe).
    async fn start(&self, guild_id: GuildId, track: &TrackInfo, params: PlaybackParams)
        -> anyhow::Result<()>;

    /// Detiene el track activo (dispara el evento de finalización)
    async fn stop(&self, guild_id: GuildId);

    /// Pausa; devuelve false si no hay nada reproduciéndose
    async fn pause(&self, guild_id: GuildId) -> bool;

    /// Reanuda; devuelve false si no hay nada pausado
    async fn resume(&self, guild_id: GuildId) -> bool;

    async fn set_volume(&self, guild_id: GuildId, volume: f32);

    async fn volume(&self, guild_id: GuildId) -> Option<f32>;

    /// Hay un track activo (reproduciendo o pausado)
    async fn is_active(&self, guild_id: GuildId) -> bool;

    /// Registra el canal por el que este guild recibe eventos de reproducción
    fn subscribe(&self, guild_id: GuildId, tx: flume::Sender<PlaybackEvent>);

    fn unsubscribe(&self, guild_id: GuildId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter_parse_selection() {
        assert_eq!(AudioFilter::parse_selection("none"), Ok(None));
        assert_eq!(
            AudioFilter::parse_selection("bass"),
            Ok(Some(AudioFilter::Bass))
        );
        assert_eq!(
            AudioFilter::parse_selection("NIGHTCORE"),
            Ok(Some(AudioFilter::Nightcore))
        );
        assert_eq!(
            AudioFilter::parse_selection("reverb"),
            Err(UnknownFilter("reverb".to_string()))
        );
    }

    #[test]
    fn test_filter_ffmpeg_mapping() {
        assert_eq!(AudioFilter::Bass.ffmpeg_filter(), "bass=g=10");
        assert!(AudioFilter::Nightcore.ffmpeg_filter().contains("atempo"));
    }
}
