use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 点唱机队列中的一项（包含歌曲与点歌用户信息，用于队列页面展示）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub entry_id: i64,
    pub song_id: i64,
    pub title: String,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    /// 时长（秒）
    pub duration: Option<i32>,
    pub user_id: i64,
    pub username: String,
    pub position: i32,
    pub added_at: NaiveDateTime,
    pub is_playing: bool,
}

/// 队列概览
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JukeboxQueueView {
    pub now_playing: Option<QueueItem>,
    /// 未播放的全部条目，正在播放的排在最前
    pub entries: Vec<QueueItem>,
    /// 排队等待的总时长（秒），不含正在播放的歌曲
    pub queued_duration: i64,
}

impl JukeboxQueueView {
    pub fn from_items(entries: Vec<QueueItem>) -> Self {
        let now_playing = entries.iter().find(|i| i.is_playing).cloned();
        let queued_duration = entries
            .iter()
            .filter(|i| !i.is_playing)
            .filter_map(|i| i.duration)
            .map(i64::from)
            .sum();
        Self {
            now_playing,
            entries,
            queued_duration,
        }
    }
}
