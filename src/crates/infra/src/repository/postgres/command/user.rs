use super::db_data::user;
use async_trait::async_trait;
use domain::user::{User, UserError, UserRepository};
use domain::value::UserId;
use sea_orm::*;

#[derive(Clone)]
pub struct UserRepositoryImpl {
    db: DatabaseConnection,
}

impl UserRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserError> {
        let result = user::Entity::find_by_id(id.as_i64())
            .one(&self.db)
            .await
            .map_err(|e| UserError::DbErr(e.to_string()))?;
        Ok(result.map(|model| model.into()))
    }
}
