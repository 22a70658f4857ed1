pub mod event;
pub mod jukebox;
pub mod song;
pub mod user;
pub mod value;
