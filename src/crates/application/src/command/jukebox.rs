use std::sync::Arc;

use super::shared::IdGenerator;
use crate::error::AppError;
use chrono::Utc;
use domain::jukebox::{JukeboxError, JukeboxQueue, JukeboxQueueRepository, QueueEntry};
use domain::song::SongRepository;
use domain::user::UserRepository;
use domain::value::{QueueEntryId, SongId, UserId};
use log::{info, warn};
use tokio::sync::Mutex;

/// 点歌命令
#[derive(Debug)]
pub struct EnqueueCmd {
    pub song_id: i64,
    pub user_id: i64,
}

/// 点唱机队列应用服务
///
/// 所有写操作都是 “加载 - 修改 - 保存” 的复合操作，进程内由 `write_lock`
/// 串行化；跨进程的竞争由仓储的版本校验兜底。
pub struct JukeboxAppService {
    queue_repository: Arc<dyn JukeboxQueueRepository>,
    song_repository: Arc<dyn SongRepository>,
    user_repository: Arc<dyn UserRepository>,
    id_generator: Arc<dyn IdGenerator>,
    write_lock: Mutex<()>,
}

impl JukeboxAppService {
    pub fn new(
        queue_repository: Arc<dyn JukeboxQueueRepository>,
        song_repository: Arc<dyn SongRepository>,
        user_repository: Arc<dyn UserRepository>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            queue_repository,
            song_repository,
            user_repository,
            id_generator,
            write_lock: Mutex::new(()),
        }
    }

    /// 点歌：校验歌曲与用户存在后追加到队尾
    pub async fn enqueue(&self, cmd: EnqueueCmd) -> Result<QueueEntry, AppError> {
        let song_id = SongId::from(cmd.song_id);
        let user_id = UserId::from(cmd.user_id);

        let song = self
            .song_repository
            .find_by_id(song_id)
            .await?
            .ok_or_else(|| AppError::AggregateNotFound("Song".to_string(), song_id.to_string()))?;
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::AggregateNotFound("User".to_string(), user_id.to_string()))?;

        let entry_id = QueueEntryId::from(self.id_generator.next_id().await?);

        let _guard = self.write_lock.lock().await;
        let mut queue = self.queue_repository.load().await?;
        let entry = queue.enqueue(entry_id, song_id, user_id, Utc::now().naive_utc());
        self.persist(&mut queue).await?;

        info!(
            "{} queued '{}' as entry {} at position {}",
            user.username, song.title, entry.id, entry.position
        );
        Ok(entry)
    }

    /// 播放下一首：结束当前歌曲并开始队首歌曲
    pub async fn play_next(&self) -> Result<QueueEntry, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut queue = self.queue_repository.load().await?;
        let entry = queue.play_next()?;
        self.persist(&mut queue).await?;

        info!("Now playing entry {} (song {})", entry.id, entry.song_id);
        Ok(entry)
    }

    /// 切歌：当前歌曲直接标记为已播放，然后开始队首歌曲
    ///
    /// 队列里没有后续歌曲时返回 `EmptyQueue`，但当前歌曲的切歌结果仍会保存。
    pub async fn skip_current(&self) -> Result<QueueEntry, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut queue = self.queue_repository.load().await?;
        let result = queue.skip_current();
        if queue.has_pending_events() {
            self.persist(&mut queue).await?;
        }

        match result {
            Ok(entry) => {
                info!("Skipped to entry {} (song {})", entry.id, entry.song_id);
                Ok(entry)
            }
            Err(e) => {
                warn!("Skip requested but nothing left to play");
                Err(e.into())
            }
        }
    }

    /// 移除一个排队中的条目
    pub async fn remove_entry(&self, entry_id: i64) -> Result<(), AppError> {
        let entry_id = QueueEntryId::from(entry_id);

        let _guard = self.write_lock.lock().await;
        let mut queue = self.queue_repository.load().await?;
        match queue.remove_entry(entry_id) {
            Ok(_) => {
                self.persist(&mut queue).await?;
                info!("Removed entry {} from the queue", entry_id);
                Ok(())
            }
            Err(JukeboxError::EntryNotFound(_)) => {
                // 不在未播放集合里，可能是已播放的历史条目
                match self.queue_repository.find_entry(entry_id).await? {
                    Some(history) => {
                        warn!("Refused to remove entry {}: already played", entry_id);
                        Err(JukeboxError::InvalidState {
                            id: entry_id,
                            state: history.state(),
                        }
                        .into())
                    }
                    None => Err(JukeboxError::EntryNotFound(entry_id).into()),
                }
            }
            Err(e) => {
                warn!("Refused to remove entry {}: {}", entry_id, e);
                Err(e.into())
            }
        }
    }

    /// 清空排队中的条目，返回删除数量
    pub async fn clear_queue(&self) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut queue = self.queue_repository.load().await?;
        let removed = queue.clear();
        if removed > 0 {
            self.persist(&mut queue).await?;
        }

        info!("Cleared {} queued entries", removed);
        Ok(removed)
    }

    /// 当前正在播放的条目
    pub async fn now_playing(&self) -> Result<Option<QueueEntry>, AppError> {
        let queue = self.queue_repository.load().await?;
        Ok(queue.now_playing().cloned())
    }

    /// 按播放顺序列出未播放的条目
    pub async fn list_queue(&self) -> Result<Vec<QueueEntry>, AppError> {
        let queue = self.queue_repository.load().await?;
        Ok(queue.iter().cloned().collect())
    }

    async fn persist(&self, queue: &mut JukeboxQueue) -> Result<(), AppError> {
        self.queue_repository.save(queue).await.map_err(|e| {
            warn!("Failed to save jukebox queue {}: {}", queue.id, e);
            AppError::from(e)
        })
    }
}

impl From<JukeboxError> for AppError {
    fn from(e: JukeboxError) -> Self {
        match e {
            JukeboxError::EntryNotFound(id) => {
                AppError::AggregateNotFound("QueueEntry".to_string(), id.to_string())
            }
            JukeboxError::EmptyQueue => AppError::EmptyQueue(e.to_string()),
            JukeboxError::InvalidState { .. } => AppError::InvalidState(e.to_string()),
            JukeboxError::VersionConflict { .. } => AppError::Conflict(e.to_string()),
            JukeboxError::DbErr(msg) => AppError::RepositoryError("JukeboxQueue".to_string(), msg),
            JukeboxError::OtherErr(msg) => AppError::UnknownError(msg),
        }
    }
}
