use anyhow::Result;
use serenity::{
    all::{CommandOptionType, Context, GuildId},
    builder::{CreateCommand, CreateCommandOption},
};
use tracing::info;

/// Definición de todos los comandos slash del bot
fn command_definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("join")
            .description("Entra a tu canal de voz y crea la sala de música"),
        CreateCommand::new("leave").description("Cierra la sala y saca al bot del canal de voz"),
        CreateCommand::new("play")
            .description("Añade una canción o playlist a la cola")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "query",
                    "Nombre de la canción o URL",
                )
                .required(true),
            ),
        CreateCommand::new("queue").description("Muestra la cola de música actual"),
        CreateCommand::new("remove")
            .description("Quita una canción de la cola")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "index",
                    "Posición en la cola (empezando en 1)",
                )
                .min_int_value(1)
                .required(true),
            ),
        CreateCommand::new("shuffle").description("Mezcla el orden de la cola"),
        CreateCommand::new("loop").description("Activa o desactiva la repetición de la cola"),
        CreateCommand::new("autoplay")
            .description("Activa o desactiva la música automática al vaciarse la cola"),
        CreateCommand::new("filter")
            .description("Aplica un filtro de audio a la siguiente canción")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "name", "Filtro a aplicar")
                    .required(true)
                    .add_string_choice("none", "none")
                    .add_string_choice("bass", "bass")
                    .add_string_choice("nightcore", "nightcore")
                    .add_string_choice("pitch", "pitch"),
            ),
        CreateCommand::new("sync_permissions")
            .description("Da acceso a la sala a todos los que están en el canal de voz"),
        CreateCommand::new("voteskip").description("Vota por saltar la canción actual"),
        CreateCommand::new("pause").description("Pausa la reproducción"),
        CreateCommand::new("resume").description("Reanuda la reproducción"),
        CreateCommand::new("skip").description("Salta la canción actual"),
        CreateCommand::new("volume")
            .description("Ajusta el volumen de la canción actual")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "level",
                    "Volumen en porcentaje (0-200)",
                )
                .min_int_value(0)
                .max_int_value(200)
                .required(true),
            ),
        CreateCommand::new("nowplaying").description("Muestra la canción que está sonando"),
        CreateCommand::new("playlist_save")
            .description("Guarda la cola actual como playlist personal")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "name", "Nombre de la playlist")
                    .required(true),
            ),
        CreateCommand::new("playlist_load")
            .description("Añade una playlist guardada a la cola")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "name", "Nombre de la playlist")
                    .required(true),
            ),
        CreateCommand::new("playlist_list").description("Lista tus playlists guardadas"),
        CreateCommand::new("playlist_delete")
            .description("Borra una playlist guardada")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "name", "Nombre de la playlist")
                    .required(true),
            ),
        CreateCommand::new("help").description("Muestra todos los comandos del bot"),
    ]
}

/// Registra los comandos en una guild concreta (propagación ~1s, útil en
/// desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    let commands = guild_id
        .set_commands(&ctx.http, command_definitions())
        .await?;
    info!(
        "📝 {} comandos registrados en guild {}",
        commands.len(),
        guild_id
    );
    Ok(())
}

/// Registra los comandos globalmente (propagación ~1h)
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    let commands =
        serenity::all::Command::set_global_commands(&ctx.http, command_definitions()).await?;
    info!("🌐 {} comandos globales registrados", commands.len());
    Ok(())
}
