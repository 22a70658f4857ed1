pub mod catalog;
pub mod jukebox;
