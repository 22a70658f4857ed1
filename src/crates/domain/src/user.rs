use crate::value::UserId;
use async_trait::async_trait;
use thiserror::Error;

/// 用户领域错误
#[derive(Error, Debug)]
pub enum UserError {
    #[error("{0}")]
    DbErr(String),
    #[error("{0}")]
    OtherErr(String),
}

/// 点歌用户
///
/// 账号与登录由其他上下文负责，这里只需要确认用户存在并用于署名。
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
}

/// 用户目录接口
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserError>;
}
