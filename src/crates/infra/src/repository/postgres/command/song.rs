use async_trait::async_trait;
use domain::song::{Song, SongError, SongRepository};
use domain::value::SongId;
use sea_orm::*;

#[derive(Debug, FromQueryResult)]
struct SongRow {
    song_id: i64,
    title: String,
    album_name: Option<String>,
    artist_name: Option<String>,
    duration: i32,
    genre: String,
    file_link: String,
}

impl From<SongRow> for Song {
    fn from(row: SongRow) -> Self {
        Song {
            id: SongId::from(row.song_id),
            title: row.title,
            album_name: row.album_name.unwrap_or_default(),
            artist_name: row.artist_name.unwrap_or_default(),
            duration: row.duration,
            genre: row.genre,
            file_link: row.file_link,
        }
    }
}

/// 曲库查询，只读
#[derive(Clone)]
pub struct SongRepositoryImpl {
    db: DatabaseConnection,
}

impl SongRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SongRepository for SongRepositoryImpl {
    async fn find_by_id(&self, id: SongId) -> Result<Option<Song>, SongError> {
        let row = SongRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT
                s.song_id,
                s.title,
                al.album_name,
                ar.artist_name,
                s.duration,
                s.genre,
                s.file_link
            FROM songs s
            LEFT JOIN albums al ON s.album_id = al.album_id
            LEFT JOIN artists ar ON al.artist_id = ar.artist_id
            WHERE s.song_id = $1
            "#,
            vec![id.as_i64().into()],
        ))
        .one(&self.db)
        .await
        .map_err(|e| SongError::DbErr(e.to_string()))?;
        Ok(row.map(Song::from))
    }
}
