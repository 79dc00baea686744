pub mod buttons;
pub mod embeds;
