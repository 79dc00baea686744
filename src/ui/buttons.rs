use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones de control
pub mod button_ids {
    pub const PAUSE: &str = "room_pause";
    pub const RESUME: &str = "room_resume";
    pub const SKIP: &str = "room_skip";
    pub const VOLUME_DOWN: &str = "room_volume_down";
    pub const VOLUME_UP: &str = "room_volume_up";
    pub const LEAVE: &str = "room_leave";
}

/// Filas de botones del mensaje Now Playing
pub fn player_controls() -> Vec<CreateActionRow> {
    let primary = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::PAUSE)
            .label("⏸️ Pause")
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::RESUME)
            .label("▶️ Resume")
            .style(ButtonStyle::Success),
        CreateButton::new(button_ids::SKIP)
            .label("⏭️ Skip")
            .style(ButtonStyle::Primary),
    ]);

    let secondary = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::VOLUME_DOWN)
            .label("🔉 Vol-")
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::VOLUME_UP)
            .label("🔊 Vol+")
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::LEAVE)
            .label("🚪 Leave")
            .style(ButtonStyle::Danger),
    ]);

    vec![primary, secondary]
}
