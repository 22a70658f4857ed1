use application::query::dao::JukeboxQueueDao;
use application::query::QueryError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use domain::value::JukeboxId;
use model::jukebox::QueueItem;
use sea_orm::*;

#[derive(Debug, FromQueryResult)]
struct QueueItemRow {
    entry_id: i64,
    song_id: i64,
    title: String,
    artist_name: Option<String>,
    album_name: Option<String>,
    duration: Option<i32>,
    user_id: i64,
    username: String,
    position: i32,
    added_at: NaiveDateTime,
    is_playing: bool,
}

impl From<QueueItemRow> for QueueItem {
    fn from(row: QueueItemRow) -> Self {
        QueueItem {
            entry_id: row.entry_id,
            song_id: row.song_id,
            title: row.title,
            artist_name: row.artist_name,
            album_name: row.album_name,
            duration: row.duration,
            user_id: row.user_id,
            username: row.username,
            position: row.position,
            added_at: row.added_at,
            is_playing: row.is_playing,
        }
    }
}

const QUEUE_ITEM_COLUMNS: &str = r#"
    SELECT
        qe.id AS entry_id,
        qe.song_id,
        s.title,
        ar.artist_name,
        al.album_name,
        s.duration,
        qe.user_id,
        u.username,
        qe.position,
        qe.added_at,
        qe.is_playing
    FROM queue_entry qe
    JOIN songs s ON qe.song_id = s.song_id
    LEFT JOIN albums al ON s.album_id = al.album_id
    LEFT JOIN artists ar ON al.artist_id = ar.artist_id
    JOIN users u ON qe.user_id = u.id
"#;

pub struct JukeboxQueueDaoImpl {
    db: DatabaseConnection,
    jukebox_id: JukeboxId,
}

impl JukeboxQueueDaoImpl {
    pub fn new(db: DatabaseConnection, jukebox_id: JukeboxId) -> Self {
        Self { db, jukebox_id }
    }
}

#[async_trait]
impl JukeboxQueueDao for JukeboxQueueDaoImpl {
    async fn get_unplayed(&self) -> Result<Vec<QueueItem>, QueryError> {
        let sql = format!(
            "{} WHERE qe.jukebox_id = $1 AND qe.played = false
             ORDER BY qe.is_playing DESC, qe.position ASC, qe.added_at ASC, qe.id ASC",
            QUEUE_ITEM_COLUMNS
        );
        let rows = QueueItemRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![self.jukebox_id.as_i64().into()],
        ))
        .all(&self.db)
        .await
        .map_err(|e| QueryError::DbError(e.to_string()))?;

        Ok(rows.into_iter().map(QueueItem::from).collect())
    }

    async fn get_recently_played(&self, limit: u64) -> Result<Vec<QueueItem>, QueryError> {
        let sql = format!(
            "{} WHERE qe.jukebox_id = $1 AND qe.played = true
             ORDER BY qe.played_at DESC NULLS LAST, qe.id DESC
             LIMIT $2",
            QUEUE_ITEM_COLUMNS
        );
        let rows = QueueItemRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![self.jukebox_id.as_i64().into(), (limit as i64).into()],
        ))
        .all(&self.db)
        .await
        .map_err(|e| QueryError::DbError(e.to_string()))?;

        Ok(rows.into_iter().map(QueueItem::from).collect())
    }
}
