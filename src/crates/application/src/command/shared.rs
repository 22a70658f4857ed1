use crate::error::AppError;

/// 通用ID生成器接口，队列条目等需要唯一ID的地方都通过它取号
#[async_trait::async_trait]
pub trait IdGenerator: Send + Sync {
    /// 生成下一个唯一ID
    async fn next_id(&self) -> Result<i64, AppError>;
}
