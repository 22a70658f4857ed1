pub const URL_PATH_JUKEBOX: &str = "/jukebox";

/// 最近播放列表的默认条数
pub const DEFAULT_RECENT_LIMIT: u64 = 20;
