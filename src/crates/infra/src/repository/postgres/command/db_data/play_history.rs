use chrono::NaiveDateTime;
use domain::jukebox::QueueEntry;
use sea_orm::{entity::prelude::*, ActiveModelBehavior, ActiveValue::NotSet, ActiveValue::Set};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Default)]
#[sea_orm(table_name = "play_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[sea_orm(column_type = "BigInteger")]
    pub play_id: i64,
    #[sea_orm(column_type = "BigInteger")]
    pub song_id: i64,
    #[sea_orm(column_type = "BigInteger")]
    pub user_id: i64,
    pub played_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// 开始播放的条目记一次播放历史，署名为点歌用户
    pub fn started(entry: &QueueEntry, played_at: NaiveDateTime) -> Self {
        ActiveModel {
            play_id: NotSet,
            song_id: Set(entry.song_id.as_i64()),
            user_id: Set(entry.user_id.as_i64()),
            played_at: Set(played_at),
        }
    }
}
