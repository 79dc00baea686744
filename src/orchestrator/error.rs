use serenity::model::id::UserId;
use thiserror::Error;

/// Taxonomía de errores del orquestador. Los fallos de resolución y de
/// reproducción son recuperables y se convierten en avance de cola; los de
/// ciclo de vida se reportan al usuario que inició la acción.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("no se pudo resolver la petición: {0}")]
    Resolution(String),

    #[error("fallo de reproducción: {0}")]
    Playback(String),

    #[error("no tienes permiso para esta acción")]
    PermissionDenied,

    #[error("el canal de la sala ya no existe")]
    ChannelMissing,

    #[error("el proveedor excedió el tiempo de espera")]
    Timeout,

    #[error("filtro desconocido: {0}")]
    UnknownFilter(String),

    #[error("la sala ya tiene dueño")]
    RoomOwned(UserId),

    #[error("espera {0} segundos antes de volver a usar este comando")]
    RateLimited(u64),

    #[error("debes estar en un canal de voz")]
    NoVoiceChannel,

    #[error("no hay ninguna sala abierta; usa /join primero")]
    NoRoom,

    #[error("error de Discord: {0}")]
    Discord(String),
}

impl MusicError {
    /// Errores que el sequencer absorbe avanzando al siguiente track
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MusicError::Resolution(_) | MusicError::Playback(_) | MusicError::Timeout
        )
    }
}
