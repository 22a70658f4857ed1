use domain::jukebox::QueueEntry;
use domain::value::{JukeboxId, QueueEntryId, SongId, UserId};
use sea_orm::{entity::prelude::*, ActiveModelBehavior, ActiveValue::Set};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Default)]
#[sea_orm(table_name = "queue_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub id: i64,
    #[sea_orm(column_type = "BigInteger")]
    pub jukebox_id: i64,
    #[sea_orm(column_type = "BigInteger")]
    pub song_id: i64,
    #[sea_orm(column_type = "BigInteger")]
    pub user_id: i64,
    pub added_at: DateTime,
    /// Rank among unplayed entries, not contiguous
    pub position: i32,
    pub is_playing: bool,
    pub played: bool,
    pub played_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Jukebox,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Jukebox => Entity::belongs_to(super::jukebox::Entity)
                .from(Column::JukeboxId)
                .to(super::jukebox::Column::Id)
                .into(),
        }
    }
}

impl Related<super::jukebox::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Jukebox.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn for_new_entry(jukebox_id: JukeboxId, entry: &QueueEntry) -> Self {
        ActiveModel {
            id: Set(entry.id.as_i64()),
            jukebox_id: Set(jukebox_id.as_i64()),
            song_id: Set(entry.song_id.as_i64()),
            user_id: Set(entry.user_id.as_i64()),
            added_at: Set(entry.added_at),
            position: Set(entry.position),
            is_playing: Set(entry.is_playing),
            played: Set(entry.played),
            played_at: Set(None),
        }
    }
}

impl From<Model> for QueueEntry {
    fn from(model: Model) -> Self {
        QueueEntry {
            id: QueueEntryId::from(model.id),
            song_id: SongId::from(model.song_id),
            user_id: UserId::from(model.user_id),
            added_at: model.added_at,
            position: model.position,
            is_playing: model.is_playing,
            played: model.played,
        }
    }
}
