use crate::query::QueryError;
use async_trait::async_trait;
use model::jukebox::QueueItem;

#[async_trait]
pub trait JukeboxQueueDao {
    /// 未播放的条目：正在播放的在前，其余按 (position, added_at, id) 升序
    async fn get_unplayed(&self) -> Result<Vec<QueueItem>, QueryError>;
    /// 最近播放过的条目，按播放先后倒序
    async fn get_recently_played(&self, limit: u64) -> Result<Vec<QueueItem>, QueryError>;
}
