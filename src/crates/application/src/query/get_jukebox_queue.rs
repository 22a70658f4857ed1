use crate::query::dao::JukeboxQueueDao;
use crate::query::QueryError;
use model::jukebox::{JukeboxQueueView, QueueItem};
use std::sync::Arc;

/// 点唱机队列查询服务
#[derive(Clone)]
pub struct GetJukeboxQueue {
    jukebox_queue_dao: Arc<dyn JukeboxQueueDao + Send + Sync>,
}

impl GetJukeboxQueue {
    pub fn new(jukebox_queue_dao: Arc<dyn JukeboxQueueDao + Send + Sync>) -> Self {
        Self { jukebox_queue_dao }
    }

    /// 按播放顺序列出未播放的条目
    pub async fn list(&self) -> Result<Vec<QueueItem>, QueryError> {
        self.jukebox_queue_dao.get_unplayed().await
    }

    /// 队列页面：正在播放 + 待播列表 + 待播总时长
    pub async fn view(&self) -> Result<JukeboxQueueView, QueryError> {
        let entries = self.jukebox_queue_dao.get_unplayed().await?;
        Ok(JukeboxQueueView::from_items(entries))
    }

    pub async fn recently_played(&self, limit: u64) -> Result<Vec<QueueItem>, QueryError> {
        if limit == 0 || limit > 100 {
            return Err(QueryError::InvalidInput(format!(
                "limit must be between 1 and 100, got {}",
                limit
            )));
        }
        self.jukebox_queue_dao.get_recently_played(limit).await
    }
}
