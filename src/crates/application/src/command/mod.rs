pub mod jukebox;
pub mod shared;
