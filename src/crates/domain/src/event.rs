/// 领域事件
///
/// 聚合在变更时记录事件，仓储在保存时按事件落库。
pub trait DomainEvent: Send + Sync {
    fn aggregate_id(&self) -> i64;
    fn version(&self) -> i64;
    /// 事件名称，用于日志
    fn name(&self) -> &'static str;
}
