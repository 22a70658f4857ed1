use super::catalog::InMemoryCatalog;
use application::query::dao::JukeboxQueueDao;
use application::query::QueryError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use domain::jukebox::{
    serving_order, JukeboxError, JukeboxEventKind, JukeboxQueue, JukeboxQueueRepository,
    QueueEntry,
};
use domain::value::{JukeboxId, QueueEntryId, SongId, UserId};
use model::jukebox::QueueItem;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A play-history record written when an entry starts playing.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRecord {
    pub song_id: SongId,
    pub user_id: UserId,
    pub played_at: NaiveDateTime,
}

#[derive(Default)]
struct JukeboxState {
    version: i64,
    entries: HashMap<QueueEntryId, QueueEntry>,
    /// Played entries, oldest first
    played_order: Vec<QueueEntryId>,
    history: Vec<PlayRecord>,
}

impl JukeboxState {
    fn apply(&mut self, kind: JukeboxEventKind, now: NaiveDateTime) {
        match kind {
            JukeboxEventKind::EntryEnqueued { entry } => {
                self.entries.insert(entry.id, entry);
            }
            JukeboxEventKind::PlaybackStarted { entry } => {
                self.history.push(PlayRecord {
                    song_id: entry.song_id,
                    user_id: entry.user_id,
                    played_at: now,
                });
                self.entries.insert(entry.id, entry);
            }
            JukeboxEventKind::PlaybackFinished { entry } | JukeboxEventKind::EntrySkipped { entry } => {
                self.played_order.push(entry.id);
                self.entries.insert(entry.id, entry);
            }
            JukeboxEventKind::EntryRemoved { entry_id } => {
                self.remove_queued(entry_id);
            }
            JukeboxEventKind::QueueCleared { entry_ids } => {
                for entry_id in entry_ids {
                    self.remove_queued(entry_id);
                }
            }
        }
    }

    fn remove_queued(&mut self, entry_id: QueueEntryId) {
        if self.entries.get(&entry_id).is_some_and(|e| e.is_queued()) {
            self.entries.remove(&entry_id);
        }
    }
}

/// 内存版点唱机队列仓储
///
/// 整个状态由一把异步锁保护，`save` 在锁内完成版本校验与全部变更，
/// 与数据库事务的效果一致。
#[derive(Clone)]
pub struct InMemoryJukeboxQueueRepository {
    jukebox_id: JukeboxId,
    state: Arc<Mutex<JukeboxState>>,
}

impl InMemoryJukeboxQueueRepository {
    pub fn new(jukebox_id: JukeboxId) -> Self {
        Self {
            jukebox_id,
            state: Arc::new(Mutex::new(JukeboxState::default())),
        }
    }

    pub async fn version(&self) -> i64 {
        self.state.lock().await.version
    }

    pub async fn play_history(&self) -> Vec<PlayRecord> {
        self.state.lock().await.history.clone()
    }

    async fn unplayed(&self) -> Vec<QueueEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<QueueEntry> =
            state.entries.values().filter(|e| !e.played).cloned().collect();
        entries.sort_by(serving_order);
        entries
    }

    async fn recently_played(&self, limit: usize) -> Vec<QueueEntry> {
        let state = self.state.lock().await;
        state
            .played_order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.entries.get(id).cloned())
            .collect()
    }
}

#[async_trait]
impl JukeboxQueueRepository for InMemoryJukeboxQueueRepository {
    async fn load(&self) -> Result<JukeboxQueue, JukeboxError> {
        let state = self.state.lock().await;
        Ok(JukeboxQueue::restore(
            self.jukebox_id,
            state.version,
            state.entries.values().filter(|e| !e.played).cloned().collect(),
        ))
    }

    async fn save(&self, queue: &mut JukeboxQueue) -> Result<(), JukeboxError> {
        let mut state = self.state.lock().await;
        if state.version != queue.version {
            return Err(JukeboxError::VersionConflict {
                expected: queue.version,
                actual: state.version,
            });
        }
        let events = queue.take_pending_events();
        if events.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().naive_utc();
        for event in events {
            state.apply(event.kind, now);
        }
        state.version += 1;
        queue.version = state.version;
        Ok(())
    }

    async fn find_entry(&self, id: QueueEntryId) -> Result<Option<QueueEntry>, JukeboxError> {
        Ok(self.state.lock().await.entries.get(&id).cloned())
    }
}

/// 内存版队列查询，把条目与曲库、用户信息拼接成展示模型
pub struct InMemoryJukeboxQueueDao {
    repository: InMemoryJukeboxQueueRepository,
    catalog: InMemoryCatalog,
}

impl InMemoryJukeboxQueueDao {
    pub fn new(repository: InMemoryJukeboxQueueRepository, catalog: InMemoryCatalog) -> Self {
        Self {
            repository,
            catalog,
        }
    }

    fn to_item(&self, entry: QueueEntry) -> Option<QueueItem> {
        // 与数据库查询的 JOIN 语义一致：歌曲或用户不存在的条目不展示
        let song = self.catalog.song(entry.song_id)?;
        let user = self.catalog.user(entry.user_id)?;
        Some(QueueItem {
            entry_id: entry.id.as_i64(),
            song_id: song.id.as_i64(),
            title: song.title,
            artist_name: Some(song.artist_name),
            album_name: Some(song.album_name),
            duration: Some(song.duration),
            user_id: user.id.as_i64(),
            username: user.username,
            position: entry.position,
            added_at: entry.added_at,
            is_playing: entry.is_playing,
        })
    }
}

#[async_trait]
impl JukeboxQueueDao for InMemoryJukeboxQueueDao {
    async fn get_unplayed(&self) -> Result<Vec<QueueItem>, QueryError> {
        let entries = self.repository.unplayed().await;
        Ok(entries.into_iter().filter_map(|e| self.to_item(e)).collect())
    }

    async fn get_recently_played(&self, limit: u64) -> Result<Vec<QueueItem>, QueryError> {
        let entries = self.repository.recently_played(limit as usize).await;
        Ok(entries.into_iter().filter_map(|e| self.to_item(e)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::song::Song;
    use domain::user::User;

    fn at(minute: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        for id in 1..=3 {
            catalog.add_song(Song {
                id: SongId::from(id),
                title: format!("Track {}", id),
                album_name: "Blue Train".to_string(),
                artist_name: "John Coltrane".to_string(),
                duration: 60 * id as i32,
                genre: "Jazz".to_string(),
                file_link: String::new(),
            });
        }
        catalog.add_user(User {
            id: UserId::from(7),
            username: "barista".to_string(),
            is_admin: true,
        });
        catalog
    }

    async fn enqueue_all(repo: &InMemoryJukeboxQueueRepository, songs: &[i64]) {
        let mut queue = repo.load().await.unwrap();
        for (i, song) in songs.iter().enumerate() {
            queue.enqueue(
                QueueEntryId::from(*song),
                SongId::from(*song),
                UserId::from(7),
                at(i as u32),
            );
        }
        repo.save(&mut queue).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_persists_entries() {
        let repo = InMemoryJukeboxQueueRepository::new(JukeboxId::default());
        enqueue_all(&repo, &[1, 2]).await;

        assert_eq!(repo.version().await, 1);
        let queue = repo.load().await.unwrap();
        assert_eq!(queue.version, 1);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected_and_applies_nothing() {
        let repo = InMemoryJukeboxQueueRepository::new(JukeboxId::default());
        enqueue_all(&repo, &[1, 2]).await;

        let mut first = repo.load().await.unwrap();
        let mut second = repo.load().await.unwrap();
        first.play_next().unwrap();
        second.clear();

        repo.save(&mut first).await.unwrap();
        let err = repo.save(&mut second).await.unwrap_err();
        assert!(matches!(
            err,
            JukeboxError::VersionConflict {
                expected: 1,
                actual: 2
            }
        ));
        assert_eq!(repo.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_started_entries_are_recorded_in_history() {
        let repo = InMemoryJukeboxQueueRepository::new(JukeboxId::default());
        enqueue_all(&repo, &[1, 2]).await;

        let mut queue = repo.load().await.unwrap();
        queue.play_next().unwrap();
        queue.play_next().unwrap();
        repo.save(&mut queue).await.unwrap();

        let history = repo.play_history().await;
        let songs: Vec<i64> = history.iter().map(|r| r.song_id.as_i64()).collect();
        assert_eq!(songs, vec![1, 2]);
        assert!(history.iter().all(|r| r.user_id == UserId::from(7)));
    }

    #[tokio::test]
    async fn test_played_entries_stay_findable() {
        let repo = InMemoryJukeboxQueueRepository::new(JukeboxId::default());
        enqueue_all(&repo, &[1, 2]).await;

        let mut queue = repo.load().await.unwrap();
        queue.play_next().unwrap();
        queue.skip_current().unwrap();
        repo.save(&mut queue).await.unwrap();

        let played = repo.find_entry(QueueEntryId::from(1)).await.unwrap().unwrap();
        assert!(played.played);
        assert_eq!(repo.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dao_lists_playing_first_with_details() {
        let repo = InMemoryJukeboxQueueRepository::new(JukeboxId::default());
        let dao = InMemoryJukeboxQueueDao::new(repo.clone(), catalog());
        enqueue_all(&repo, &[1, 2, 3]).await;

        let mut queue = repo.load().await.unwrap();
        queue.play_next().unwrap();
        queue.play_next().unwrap();
        repo.save(&mut queue).await.unwrap();

        let items = dao.get_unplayed().await.unwrap();
        let ids: Vec<(i64, bool)> = items.iter().map(|i| (i.song_id, i.is_playing)).collect();
        assert_eq!(ids, vec![(2, true), (3, false)]);
        assert_eq!(items[0].title, "Track 2");
        assert_eq!(items[0].username, "barista");

        let recent = dao.get_recently_played(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].song_id, 1);
    }
}
