use crate::event::DomainEvent;
use crate::value::{JukeboxId, QueueEntryId, SongId, UserId};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::{self, Display};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JukeboxError {
    #[error("Queue entry not found: {0}")]
    EntryNotFound(QueueEntryId),
    #[error("Nothing left in the queue to play")]
    EmptyQueue,
    #[error("Queue entry {id} is {state}")]
    InvalidState { id: QueueEntryId, state: EntryState },
    #[error("Version conflict: expected {expected}, got {actual}")]
    VersionConflict { expected: i64, actual: i64 },
    #[error("Database error: {0}")]
    DbErr(String),
    #[error("{0}")]
    OtherErr(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Queued,
    Playing,
    Played,
}

impl Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryState::Queued => "queued",
            EntryState::Playing => "playing",
            EntryState::Played => "played",
        };
        f.write_str(s)
    }
}

/// A song request waiting in, or being served by, the shared jukebox queue.
///
/// Once `played` is set the entry is history and none of its fields change again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub song_id: SongId,
    pub user_id: UserId,
    pub added_at: NaiveDateTime,
    pub position: i32,
    pub is_playing: bool,
    pub played: bool,
}

impl QueueEntry {
    fn new(
        id: QueueEntryId,
        song_id: SongId,
        user_id: UserId,
        position: i32,
        added_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            song_id,
            user_id,
            added_at,
            position,
            is_playing: false,
            played: false,
        }
    }

    pub fn state(&self) -> EntryState {
        if self.played {
            EntryState::Played
        } else if self.is_playing {
            EntryState::Playing
        } else {
            EntryState::Queued
        }
    }

    pub fn is_queued(&self) -> bool {
        self.state() == EntryState::Queued
    }

    fn start(&mut self) {
        self.is_playing = true;
    }

    fn finish(&mut self) {
        self.is_playing = false;
        self.played = true;
    }
}

/// Serving order of unplayed entries: the playing entry first, then
/// `(position, added_at)` ascending, with the id as the last tie-break.
pub fn serving_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    b.is_playing
        .cmp(&a.is_playing)
        .then(a.position.cmp(&b.position))
        .then(a.added_at.cmp(&b.added_at))
        .then(a.id.cmp(&b.id))
}

/// 点唱机共享队列聚合根
///
/// 只持有未播放的条目（排队中和正在播放的），已播放的条目属于历史记录，
/// 由仓储单独查询。`version` 用于保存时的乐观锁校验。
#[derive(Debug, Clone)]
pub struct JukeboxQueue {
    pub id: JukeboxId,
    pub version: i64,
    entries: Vec<QueueEntry>,
    pending_events: Vec<JukeboxDomainEvent>,
}

impl JukeboxQueue {
    pub fn new(id: JukeboxId) -> Self {
        Self {
            id,
            version: 0,
            entries: vec![],
            pending_events: vec![],
        }
    }

    /// 从持久化状态恢复，已播放的条目会被忽略
    pub fn restore(id: JukeboxId, version: i64, entries: Vec<QueueEntry>) -> Self {
        let mut entries: Vec<QueueEntry> = entries.into_iter().filter(|e| !e.played).collect();
        entries.sort_by(serving_order);
        Self {
            id,
            version,
            entries,
            pending_events: vec![],
        }
    }

    fn record(&mut self, kind: JukeboxEventKind) {
        let event = JukeboxDomainEvent {
            jukebox_id: self.id,
            version: self.version,
            kind,
        };
        self.pending_events.push(event);
    }

    fn reorder(&mut self) {
        self.entries.sort_by(serving_order);
    }

    /// 追加一首歌到队尾，位置为当前未播放条目的最大位置加一
    pub fn enqueue(
        &mut self,
        entry_id: QueueEntryId,
        song_id: SongId,
        user_id: UserId,
        added_at: NaiveDateTime,
    ) -> QueueEntry {
        let position = self
            .entries
            .iter()
            .map(|e| e.position)
            .max()
            .map_or(0, |max| max + 1);
        let entry = QueueEntry::new(entry_id, song_id, user_id, position, added_at);
        self.entries.push(entry.clone());
        self.reorder();
        self.record(JukeboxEventKind::EntryEnqueued {
            entry: entry.clone(),
        });
        entry
    }

    /// Completes the playing entry (if any) and starts the head.
    ///
    /// Fails without touching anything when there is no queued entry to
    /// start, so a song that is already playing keeps playing.
    pub fn play_next(&mut self) -> Result<QueueEntry, JukeboxError> {
        let next_id = self.head().map(|e| e.id).ok_or(JukeboxError::EmptyQueue)?;
        if let Some(finished) = self.take_current() {
            self.record(JukeboxEventKind::PlaybackFinished { entry: finished });
        }
        self.start(next_id)
    }

    /// Marks the playing entry as played without waiting for it to end,
    /// then starts the head.
    ///
    /// The skip itself sticks even when nothing is left to start: the
    /// caller gets `EmptyQueue` but the pending events still carry the skip.
    pub fn skip_current(&mut self) -> Result<QueueEntry, JukeboxError> {
        if let Some(skipped) = self.take_current() {
            self.record(JukeboxEventKind::EntrySkipped { entry: skipped });
        }
        let next_id = self.head().map(|e| e.id).ok_or(JukeboxError::EmptyQueue)?;
        self.start(next_id)
    }

    /// 删除一个排队中的条目，不会重新编号剩余条目的位置
    pub fn remove_entry(&mut self, entry_id: QueueEntryId) -> Result<QueueEntry, JukeboxError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or(JukeboxError::EntryNotFound(entry_id))?;
        if !self.entries[idx].is_queued() {
            return Err(JukeboxError::InvalidState {
                id: entry_id,
                state: self.entries[idx].state(),
            });
        }
        let removed = self.entries.remove(idx);
        self.record(JukeboxEventKind::EntryRemoved { entry_id });
        Ok(removed)
    }

    /// 清空所有排队中的条目，正在播放的条目不受影响
    pub fn clear(&mut self) -> usize {
        let (queued, kept): (Vec<QueueEntry>, Vec<QueueEntry>) =
            self.entries.drain(..).partition(|e| e.is_queued());
        self.entries = kept;
        if queued.is_empty() {
            return 0;
        }
        let entry_ids: Vec<QueueEntryId> = queued.iter().map(|e| e.id).collect();
        let removed = entry_ids.len();
        self.record(JukeboxEventKind::QueueCleared { entry_ids });
        removed
    }

    pub fn now_playing(&self) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.is_playing)
    }

    /// The queued entry that plays next.
    pub fn head(&self) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.is_queued())
    }

    pub fn get(&self, entry_id: QueueEntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    /// Unplayed entries in serving order. The iterator is `Clone`, so a
    /// listing can be walked again without touching the queue.
    pub fn iter(&self) -> std::slice::Iter<'_, QueueEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    pub fn take_pending_events(&mut self) -> Vec<JukeboxDomainEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn take_current(&mut self) -> Option<QueueEntry> {
        let idx = self.entries.iter().position(|e| e.is_playing)?;
        let mut entry = self.entries.remove(idx);
        entry.finish();
        Some(entry)
    }

    fn start(&mut self, entry_id: QueueEntryId) -> Result<QueueEntry, JukeboxError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or(JukeboxError::EntryNotFound(entry_id))?;
        entry.start();
        let started = entry.clone();
        self.reorder();
        self.record(JukeboxEventKind::PlaybackStarted {
            entry: started.clone(),
        });
        Ok(started)
    }
}

impl<'a> IntoIterator for &'a JukeboxQueue {
    type Item = &'a QueueEntry;
    type IntoIter = std::slice::Iter<'a, QueueEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub enum JukeboxEventKind {
    EntryEnqueued { entry: QueueEntry },
    PlaybackStarted { entry: QueueEntry },
    PlaybackFinished { entry: QueueEntry },
    EntrySkipped { entry: QueueEntry },
    EntryRemoved { entry_id: QueueEntryId },
    QueueCleared { entry_ids: Vec<QueueEntryId> },
}

#[derive(Debug, Clone)]
pub struct JukeboxDomainEvent {
    pub jukebox_id: JukeboxId,
    /// Version of the queue the event was recorded against
    pub version: i64,
    pub kind: JukeboxEventKind,
}

impl DomainEvent for JukeboxDomainEvent {
    fn aggregate_id(&self) -> i64 {
        self.jukebox_id.as_i64()
    }
    fn version(&self) -> i64 {
        self.version
    }
    fn name(&self) -> &'static str {
        match self.kind {
            JukeboxEventKind::EntryEnqueued { .. } => "EntryEnqueued",
            JukeboxEventKind::PlaybackStarted { .. } => "PlaybackStarted",
            JukeboxEventKind::PlaybackFinished { .. } => "PlaybackFinished",
            JukeboxEventKind::EntrySkipped { .. } => "EntrySkipped",
            JukeboxEventKind::EntryRemoved { .. } => "EntryRemoved",
            JukeboxEventKind::QueueCleared { .. } => "QueueCleared",
        }
    }
}

/// 点唱机队列仓储接口
///
/// `save` 必须在一个事务内应用全部待处理事件，并以 `version` 做乐观锁校验；
/// 校验失败时返回 `VersionConflict` 且不落库任何变更。
#[async_trait]
pub trait JukeboxQueueRepository: Send + Sync {
    /// 加载队列（仅未播放条目）
    async fn load(&self) -> Result<JukeboxQueue, JukeboxError>;

    /// 保存队列的待处理事件，成功后 `version` 加一
    async fn save(&self, queue: &mut JukeboxQueue) -> Result<(), JukeboxError>;

    /// 按 ID 查找条目，包括已播放的历史条目
    async fn find_entry(&self, id: QueueEntryId) -> Result<Option<QueueEntry>, JukeboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
            + Duration::seconds(secs)
    }

    fn queue_with(songs: &[(i64, i64)]) -> JukeboxQueue {
        let mut queue = JukeboxQueue::new(JukeboxId::default());
        for (i, (song, user)) in songs.iter().enumerate() {
            queue.enqueue(
                QueueEntryId::from(i as i64 + 1),
                SongId::from(*song),
                UserId::from(*user),
                at(i as i64),
            );
        }
        queue.take_pending_events();
        queue
    }

    fn songs(queue: &JukeboxQueue) -> Vec<i64> {
        queue.iter().map(|e| e.song_id.as_i64()).collect()
    }

    fn playing_count(queue: &JukeboxQueue) -> usize {
        queue.iter().filter(|e| e.is_playing).count()
    }

    #[test]
    fn test_enqueue_assigns_increasing_positions() {
        let queue = queue_with(&[(10, 1), (20, 2), (30, 1)]);
        let positions: Vec<i32> = queue.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(songs(&queue), vec![10, 20, 30]);
        assert!(queue.iter().all(|e| e.state() == EntryState::Queued));
    }

    #[test]
    fn test_enqueue_allows_duplicate_songs() {
        let queue = queue_with(&[(10, 1), (10, 2)]);
        assert_eq!(songs(&queue), vec![10, 10]);
    }

    #[test]
    fn test_enqueue_records_event() {
        let mut queue = JukeboxQueue::new(JukeboxId::default());
        queue.enqueue(QueueEntryId::from(1), SongId::from(5), UserId::from(9), at(0));
        let events = queue.take_pending_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "EntryEnqueued");
        assert!(!queue.has_pending_events());
    }

    #[test]
    fn test_equal_position_falls_back_to_added_at_then_id() {
        let entry = |id: i64, position: i32, added_at: NaiveDateTime| QueueEntry {
            id: QueueEntryId::from(id),
            song_id: SongId::from(id * 10),
            user_id: UserId::from(1),
            added_at,
            position,
            is_playing: false,
            played: false,
        };
        let queue = JukeboxQueue::restore(
            JukeboxId::default(),
            3,
            vec![
                entry(3, 1, at(5)),
                entry(2, 1, at(1)),
                entry(4, 1, at(1)),
                entry(1, 0, at(9)),
            ],
        );
        let ids: Vec<i64> = queue.iter().map(|e| e.id.as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 4, 3]);
        assert_eq!(queue.version, 3);
    }

    #[test]
    fn test_restore_drops_played_entries() {
        let mut queue = queue_with(&[(10, 1), (20, 1)]);
        queue.play_next().unwrap();
        let mut entries: Vec<QueueEntry> = queue.iter().cloned().collect();
        entries[0].is_playing = false;
        entries[0].played = true;
        let restored = JukeboxQueue::restore(JukeboxId::default(), 1, entries);
        assert_eq!(songs(&restored), vec![20]);
    }

    #[test]
    fn test_play_next_on_empty_queue_fails_without_events() {
        let mut queue = JukeboxQueue::new(JukeboxId::default());
        assert!(matches!(queue.play_next(), Err(JukeboxError::EmptyQueue)));
        assert!(!queue.has_pending_events());
    }

    #[test]
    fn test_play_next_starts_head_and_completes_current() {
        let mut queue = queue_with(&[(10, 1), (20, 2)]);

        let first = queue.play_next().unwrap();
        assert_eq!(first.song_id, SongId::from(10));
        assert!(first.is_playing);
        assert_eq!(playing_count(&queue), 1);

        let second = queue.play_next().unwrap();
        assert_eq!(second.song_id, SongId::from(20));
        assert_eq!(songs(&queue), vec![20]);
        assert_eq!(playing_count(&queue), 1);

        let names: Vec<&str> = queue
            .take_pending_events()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(
            names,
            vec!["PlaybackStarted", "PlaybackFinished", "PlaybackStarted"]
        );
    }

    #[test]
    fn test_play_next_keeps_current_when_nothing_queued() {
        let mut queue = queue_with(&[(10, 1)]);
        queue.play_next().unwrap();
        queue.take_pending_events();

        assert!(matches!(queue.play_next(), Err(JukeboxError::EmptyQueue)));
        assert_eq!(queue.now_playing().unwrap().song_id, SongId::from(10));
        assert!(!queue.has_pending_events());
    }

    #[test]
    fn test_skip_on_single_entry_empties_queue() {
        let mut queue = queue_with(&[(10, 1)]);
        queue.play_next().unwrap();
        queue.take_pending_events();

        assert!(matches!(queue.skip_current(), Err(JukeboxError::EmptyQueue)));
        assert!(queue.is_empty());
        let events = queue.take_pending_events();
        assert_eq!(events.len(), 1);
        match &events[0].kind {
            JukeboxEventKind::EntrySkipped { entry } => {
                assert!(entry.played);
                assert!(!entry.is_playing);
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert!(matches!(queue.play_next(), Err(JukeboxError::EmptyQueue)));
    }

    #[test]
    fn test_skip_without_current_behaves_like_play_next() {
        let mut queue = queue_with(&[(10, 1), (20, 1)]);
        let started = queue.skip_current().unwrap();
        assert_eq!(started.song_id, SongId::from(10));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_skip_on_empty_queue_mutates_nothing() {
        let mut queue = JukeboxQueue::new(JukeboxId::default());
        assert!(matches!(queue.skip_current(), Err(JukeboxError::EmptyQueue)));
        assert!(!queue.has_pending_events());
    }

    #[test]
    fn test_remove_playing_entry_is_rejected() {
        let mut queue = queue_with(&[(10, 1), (20, 1)]);
        let playing = queue.play_next().unwrap();

        let err = queue.remove_entry(playing.id).unwrap_err();
        assert!(matches!(
            err,
            JukeboxError::InvalidState {
                state: EntryState::Playing,
                ..
            }
        ));
        assert!(queue.get(playing.id).unwrap().is_playing);
    }

    #[test]
    fn test_remove_unknown_entry_is_not_found() {
        let mut queue = queue_with(&[(10, 1)]);
        assert!(matches!(
            queue.remove_entry(QueueEntryId::from(99)),
            Err(JukeboxError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_remove_does_not_renumber_positions() {
        let mut queue = queue_with(&[(10, 1), (20, 1), (30, 1)]);
        queue.remove_entry(QueueEntryId::from(2)).unwrap();
        let positions: Vec<i32> = queue.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 2]);

        let added = queue.enqueue(QueueEntryId::from(4), SongId::from(40), UserId::from(1), at(10));
        assert_eq!(added.position, 3);
        assert_eq!(songs(&queue), vec![10, 30, 40]);
    }

    #[test]
    fn test_clear_keeps_playing_entry_and_is_idempotent() {
        let mut queue = queue_with(&[(10, 1), (20, 1), (30, 1)]);
        queue.play_next().unwrap();
        queue.take_pending_events();

        assert_eq!(queue.clear(), 2);
        assert_eq!(songs(&queue), vec![10]);
        assert!(queue.now_playing().is_some());

        assert_eq!(queue.clear(), 0);
        assert_eq!(queue.take_pending_events().len(), 1);
    }

    #[test]
    fn test_playing_entry_listed_first_regardless_of_position() {
        let entry = |id: i64, position: i32, is_playing: bool| QueueEntry {
            id: QueueEntryId::from(id),
            song_id: SongId::from(id * 10),
            user_id: UserId::from(1),
            added_at: at(id),
            position,
            is_playing,
            played: false,
        };
        let queue = JukeboxQueue::restore(
            JukeboxId::default(),
            0,
            vec![entry(1, 0, false), entry(2, 7, true), entry(3, 1, false)],
        );
        let listing: Vec<(i64, bool)> = queue
            .iter()
            .map(|e| (e.id.as_i64(), e.is_playing))
            .collect();
        assert_eq!(listing, vec![(2, true), (1, false), (3, false)]);
        assert_eq!(queue.head().unwrap().id, QueueEntryId::from(1));
    }

    #[test]
    fn test_listing_is_restartable() {
        let queue = queue_with(&[(10, 1), (20, 1)]);
        let listing = queue.iter();
        let first: Vec<_> = listing.clone().map(|e| e.id).collect();
        let second: Vec<_> = listing.map(|e| e.id).collect();
        assert_eq!(first, second);
        assert_eq!((&queue).into_iter().count(), 2);
    }

    #[test]
    fn test_cafe_scenario() {
        // S1 by U1, S2 by U2, S3 by U1
        let mut queue = queue_with(&[(1, 1), (2, 2), (3, 1)]);
        assert_eq!(songs(&queue), vec![1, 2, 3]);

        let s1 = queue.play_next().unwrap();
        assert_eq!(s1.song_id, SongId::from(1));
        assert_eq!(songs(&queue), vec![1, 2, 3]);
        assert!(queue.iter().next().unwrap().is_playing);

        let s2 = queue.skip_current().unwrap();
        assert_eq!(s2.song_id, SongId::from(2));
        assert!(queue.get(s1.id).is_none());

        assert_eq!(queue.clear(), 1);
        assert_eq!(songs(&queue), vec![2]);
        assert!(queue.now_playing().unwrap().is_playing);
    }

    #[test]
    fn test_at_most_one_playing_across_operations() {
        let mut queue = JukeboxQueue::new(JukeboxId::default());
        let mut next_id = 1;
        for round in 0..20 {
            match round % 5 {
                0 | 1 => {
                    queue.enqueue(
                        QueueEntryId::from(next_id),
                        SongId::from(next_id),
                        UserId::from(1),
                        at(next_id),
                    );
                    next_id += 1;
                }
                2 => {
                    let _ = queue.play_next();
                }
                3 => {
                    let _ = queue.skip_current();
                }
                _ => {
                    queue.clear();
                }
            }
            assert!(playing_count(&queue) <= 1, "round {}", round);
        }
    }
}
