use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::IsAdmin).boolean().not_null().default(false))
                    .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        // Create artists table
        manager
            .create_table(
                Table::create()
                    .table(Artists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Artists::ArtistId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Artists::ArtistName).string().not_null())
                    .to_owned(),
            )
            .await?;

        // Create albums table
        manager
            .create_table(
                Table::create()
                    .table(Albums::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Albums::AlbumId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Albums::AlbumName).string().not_null())
                    .col(ColumnDef::new(Albums::ArtistId).big_integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_albums_artist_id")
                            .from(Albums::Table, Albums::ArtistId)
                            .to(Artists::Table, Artists::ArtistId)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create songs table
        manager
            .create_table(
                Table::create()
                    .table(Songs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Songs::SongId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Songs::Title).string().not_null())
                    .col(ColumnDef::new(Songs::AlbumId).big_integer().null())
                    .col(ColumnDef::new(Songs::Duration).integer().not_null().default(0))
                    .col(ColumnDef::new(Songs::Genre).string().not_null().default(""))
                    .col(ColumnDef::new(Songs::FileLink).string().not_null().default(""))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_songs_album_id")
                            .from(Songs::Table, Songs::AlbumId)
                            .to(Albums::Table, Albums::AlbumId)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create play_history table
        manager
            .create_table(
                Table::create()
                    .table(PlayHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlayHistory::PlayId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlayHistory::SongId).big_integer().not_null())
                    .col(ColumnDef::new(PlayHistory::UserId).big_integer().not_null())
                    .col(ColumnDef::new(PlayHistory::PlayedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_play_history_song_id")
                            .from(PlayHistory::Table, PlayHistory::SongId)
                            .to(Songs::Table, Songs::SongId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_play_history_user_id")
                            .from(PlayHistory::Table, PlayHistory::UserId)
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
                    .name("idx_play_history_user_id")
                    .table(PlayHistory::Table)
                    .col(PlayHistory::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlayHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Songs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Albums::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Artists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    IsAdmin,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Artists {
    Table,
    ArtistId,
    ArtistName,
}

#[derive(DeriveIden)]
enum Albums {
    Table,
    AlbumId,
    AlbumName,
    ArtistId,
}

#[derive(DeriveIden)]
enum Songs {
    Table,
    SongId,
    Title,
    AlbumId,
    Duration,
    Genre,
    FileLink,
}

#[derive(DeriveIden)]
enum PlayHistory {
    Table,
    PlayId,
    SongId,
    UserId,
    PlayedAt,
}
