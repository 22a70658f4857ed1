pub mod db_data;
pub mod jukebox;
pub mod song;
pub mod user;
