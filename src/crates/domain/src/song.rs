use crate::value::SongId;
use async_trait::async_trait;
use thiserror::Error;

/// 曲库领域错误
#[derive(Error, Debug)]
pub enum SongError {
    #[error("Database error: {0}")]
    DbErr(String),
    #[error("{0}")]
    OtherErr(String),
}

/// 曲库中的歌曲
///
/// 曲库由其他上下文维护，点唱机队列只通过 `SongId` 引用歌曲。
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub album_name: String,
    pub artist_name: String,
    /// 时长（秒）
    pub duration: i32,
    pub genre: String,
    pub file_link: String,
}

/// 曲库仓储接口
#[async_trait]
pub trait SongRepository: Send + Sync {
    async fn find_by_id(&self, id: SongId) -> Result<Option<Song>, SongError>;
}
