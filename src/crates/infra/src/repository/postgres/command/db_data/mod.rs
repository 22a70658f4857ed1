pub mod jukebox;
pub mod play_history;
pub mod queue_entry;
pub mod user;
