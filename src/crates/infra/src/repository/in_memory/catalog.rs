use async_trait::async_trait;
use dashmap::DashMap;
use domain::song::{Song, SongError, SongRepository};
use domain::user::{User, UserError, UserRepository};
use domain::value::{SongId, UserId};
use std::sync::Arc;

/// 内存版曲库与用户目录，用于测试和无数据库的开发模式
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    songs: Arc<DashMap<SongId, Song>>,
    users: Arc<DashMap<UserId, User>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开发模式用的示例数据：店主 + 两位熟客，几首常点的歌
    pub fn with_sample_data() -> Self {
        let catalog = Self::new();
        for (id, username, is_admin) in [
            (1, "cafe_owner", true),
            (2, "john_doe", false),
            (3, "emma_wilson", false),
        ] {
            catalog.add_user(User {
                id: UserId::from(id),
                username: username.to_string(),
                is_admin,
            });
        }

        let songs = [
            (1, "Anti-Hero", "Midnights", "Taylor Swift", 200, "Pop"),
            (2, "Shape of You", "Divide", "Ed Sheeran", 233, "Pop"),
            (3, "Blinding Lights", "After Hours", "The Weeknd", 200, "Synth-pop"),
            (4, "Levitating", "Future Nostalgia", "Dua Lipa", 203, "Disco"),
            (5, "Easy On Me", "30", "Adele", 224, "Soul"),
            (6, "As It Was", "Harry's House", "Harry Styles", 167, "Pop"),
        ];
        for (id, title, album, artist, duration, genre) in songs {
            catalog.add_song(Song {
                id: SongId::from(id),
                title: title.to_string(),
                album_name: album.to_string(),
                artist_name: artist.to_string(),
                duration,
                genre: genre.to_string(),
                file_link: String::new(),
            });
        }
        catalog
    }

    pub fn add_song(&self, song: Song) {
        self.songs.insert(song.id, song);
    }

    pub fn add_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn song(&self, id: SongId) -> Option<Song> {
        self.songs.get(&id).map(|v| v.clone())
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|v| v.clone())
    }
}

#[async_trait]
impl SongRepository for InMemoryCatalog {
    async fn find_by_id(&self, id: SongId) -> Result<Option<Song>, SongError> {
        Ok(self.song(id))
    }
}

#[async_trait]
impl UserRepository for InMemoryCatalog {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserError> {
        Ok(self.user(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_data_is_resolvable() {
        let catalog = InMemoryCatalog::with_sample_data();
        let owner = UserRepository::find_by_id(&catalog, UserId::from(1))
            .await
            .unwrap()
            .unwrap();
        assert!(owner.is_admin);

        let song = SongRepository::find_by_id(&catalog, SongId::from(3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(song.artist_name, "The Weeknd");
        assert!(SongRepository::find_by_id(&catalog, SongId::from(99))
            .await
            .unwrap()
            .is_none());
    }
}
