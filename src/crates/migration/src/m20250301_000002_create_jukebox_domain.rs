use log::info;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create jukebox table
        // version 是整条队列的乐观锁，每次写入 +1
        manager
            .create_table(
                Table::create()
                    .table(Jukebox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Jukebox::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Jukebox::Version).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Jukebox::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        // Create queue_entry table
        manager
            .create_table(
                Table::create()
                    .table(QueueEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueueEntry::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueueEntry::JukeboxId).big_integer().not_null())
                    .col(ColumnDef::new(QueueEntry::SongId).big_integer().not_null())
                    .col(ColumnDef::new(QueueEntry::UserId).big_integer().not_null())
                    .col(ColumnDef::new(QueueEntry::AddedAt).date_time().not_null())
                    .col(ColumnDef::new(QueueEntry::Position).integer().not_null())
                    .col(
                        ColumnDef::new(QueueEntry::IsPlaying)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(QueueEntry::Played)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(QueueEntry::PlayedAt).date_time().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_queue_entry_jukebox_id")
                            .from(QueueEntry::Table, QueueEntry::JukeboxId)
                            .to(Jukebox::Table, Jukebox::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_queue_entry_song_id")
                            .from(QueueEntry::Table, QueueEntry::SongId)
                            .to(Songs::Table, Songs::SongId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_queue_entry_user_id")
                            .from(QueueEntry::Table, QueueEntry::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_queue_entry_unplayed")
                    .table(QueueEntry::Table)
                    .col(QueueEntry::JukeboxId)
                    .col(QueueEntry::Played)
                    .col(QueueEntry::Position)
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        // 同一台点唱机同时最多一首在播
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_queue_entry_playing \
             ON queue_entry (jukebox_id) WHERE is_playing",
        )
        .await?;

        info!("Seeding default jukebox...");
        db.execute_unprepared(
            "INSERT INTO jukebox (id, version, updated_at) VALUES (1, 0, NOW()) \
             ON CONFLICT (id) DO NOTHING",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueueEntry::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jukebox::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Jukebox {
    Table,
    Id,
    Version,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum QueueEntry {
    Table,
    Id,
    JukeboxId,
    SongId,
    UserId,
    AddedAt,
    Position,
    IsPlaying,
    Played,
    PlayedAt,
}

#[derive(DeriveIden)]
enum Songs {
    Table,
    SongId,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
