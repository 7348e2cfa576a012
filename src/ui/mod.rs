//! Discord-facing presentation: embeds, announcement text and buttons.

pub mod buttons;
pub mod embeds;
