pub mod jukebox;
