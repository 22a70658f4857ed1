use super::db_data::{
    jukebox::{self, Entity as JukeboxEntity},
    play_history::ActiveModel as PlayHistoryActiveModel,
    queue_entry::{self, ActiveModel as EntryActiveModel, Entity as EntryEntity, Model as EntryModel},
};
use async_trait::async_trait;
use domain::event::DomainEvent;
use domain::jukebox::{
    JukeboxError, JukeboxEventKind, JukeboxQueue, JukeboxQueueRepository, QueueEntry,
};
use domain::value::{JukeboxId, QueueEntryId};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::*;

#[derive(Clone)]
pub struct JukeboxQueueRepositoryImpl {
    db: DbConn,
    jukebox_id: JukeboxId,
}

impl JukeboxQueueRepositoryImpl {
    pub fn new(db: DbConn, jukebox_id: JukeboxId) -> Self {
        Self { db, jukebox_id }
    }

    async fn current_version<C: ConnectionTrait>(&self, conn: &C) -> Result<Option<i64>, JukeboxError> {
        let row = JukeboxEntity::find_by_id(self.jukebox_id.as_i64())
            .one(conn)
            .await
            .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
        Ok(row.map(|m| m.version))
    }

    /// Compare-and-set on `jukebox.version`. The UPDATE also takes the row
    /// lock, so concurrent writers queue up behind this transaction.
    async fn bump_version(&self, txn: &DatabaseTransaction, expected: i64) -> Result<i64, JukeboxError> {
        let now = chrono::Utc::now().naive_utc();
        let result = JukeboxEntity::update_many()
            .col_expr(jukebox::Column::Version, Expr::col(jukebox::Column::Version).add(1))
            .col_expr(jukebox::Column::UpdatedAt, Expr::value(now))
            .filter(jukebox::Column::Id.eq(self.jukebox_id.as_i64()))
            .filter(jukebox::Column::Version.eq(expected))
            .exec(txn)
            .await
            .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
        if result.rows_affected == 1 {
            return Ok(expected + 1);
        }

        match self.current_version(txn).await? {
            None if expected == 0 => {
                jukebox::ActiveModel {
                    id: Set(self.jukebox_id.as_i64()),
                    version: Set(1),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await
                .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
                Ok(1)
            }
            actual => Err(JukeboxError::VersionConflict {
                expected,
                actual: actual.unwrap_or(0),
            }),
        }
    }

    async fn apply(&self, txn: &DatabaseTransaction, kind: JukeboxEventKind) -> Result<(), JukeboxError> {
        let now = chrono::Utc::now().naive_utc();
        match kind {
            JukeboxEventKind::EntryEnqueued { entry } => {
                EntryActiveModel::for_new_entry(self.jukebox_id, &entry)
                    .insert(txn)
                    .await
                    .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
            }
            JukeboxEventKind::PlaybackStarted { entry } => {
                let result = EntryEntity::update_many()
                    .col_expr(queue_entry::Column::IsPlaying, Expr::value(true))
                    .filter(queue_entry::Column::Id.eq(entry.id.as_i64()))
                    .filter(queue_entry::Column::Played.eq(false))
                    .exec(txn)
                    .await
                    .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
                if result.rows_affected == 0 {
                    return Err(JukeboxError::EntryNotFound(entry.id));
                }
                PlayHistoryActiveModel::started(&entry, now)
                    .insert(txn)
                    .await
                    .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
            }
            JukeboxEventKind::PlaybackFinished { entry } | JukeboxEventKind::EntrySkipped { entry } => {
                EntryEntity::update_many()
                    .col_expr(queue_entry::Column::IsPlaying, Expr::value(false))
                    .col_expr(queue_entry::Column::Played, Expr::value(true))
                    .col_expr(queue_entry::Column::PlayedAt, Expr::value(Some(now)))
                    .filter(queue_entry::Column::Id.eq(entry.id.as_i64()))
                    .exec(txn)
                    .await
                    .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
            }
            JukeboxEventKind::EntryRemoved { entry_id } => {
                self.delete_queued(txn, vec![entry_id]).await?;
            }
            JukeboxEventKind::QueueCleared { entry_ids } => {
                self.delete_queued(txn, entry_ids).await?;
            }
        }
        Ok(())
    }

    async fn delete_queued(&self, txn: &DatabaseTransaction, ids: Vec<QueueEntryId>) -> Result<(), JukeboxError> {
        let ids: Vec<i64> = ids.into_iter().map(i64::from).collect();
        EntryEntity::delete_many()
            .filter(queue_entry::Column::Id.is_in(ids))
            .filter(queue_entry::Column::IsPlaying.eq(false))
            .filter(queue_entry::Column::Played.eq(false))
            .exec(txn)
            .await
            .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl JukeboxQueueRepository for JukeboxQueueRepositoryImpl {
    async fn load(&self) -> Result<JukeboxQueue, JukeboxError> {
        let version = self.current_version(&self.db).await?.unwrap_or(0);
        let entries: Vec<EntryModel> = EntryEntity::find()
            .filter(queue_entry::Column::JukeboxId.eq(self.jukebox_id.as_i64()))
            .filter(queue_entry::Column::Played.eq(false))
            .order_by_asc(queue_entry::Column::Position)
            .order_by_asc(queue_entry::Column::AddedAt)
            .all(&self.db)
            .await
            .map_err(|e| JukeboxError::DbErr(e.to_string()))?;

        Ok(JukeboxQueue::restore(
            self.jukebox_id,
            version,
            entries.into_iter().map(QueueEntry::from).collect(),
        ))
    }

    async fn save(&self, queue: &mut JukeboxQueue) -> Result<(), JukeboxError> {
        let events = queue.take_pending_events();
        if events.is_empty() {
            return Ok(());
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| JukeboxError::DbErr(e.to_string()))?;

        // 出错时 txn 被 drop，事务自动回滚
        let new_version = self.bump_version(&txn, queue.version).await?;
        for event in events {
            debug!("Applying {} to jukebox {}", event.name(), event.aggregate_id());
            self.apply(&txn, event.kind).await?;
        }

        txn.commit()
            .await
            .map_err(|e| JukeboxError::DbErr(e.to_string()))?;

        queue.version = new_version;
        Ok(())
    }

    async fn find_entry(&self, id: QueueEntryId) -> Result<Option<QueueEntry>, JukeboxError> {
        let result: Option<EntryModel> = EntryEntity::find_by_id(id.as_i64())
            .filter(queue_entry::Column::JukeboxId.eq(self.jukebox_id.as_i64()))
            .one(&self.db)
            .await
            .map_err(|e| JukeboxError::DbErr(e.to_string()))?;
        Ok(result.map(QueueEntry::from))
    }
}
