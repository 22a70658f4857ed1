use application::command::shared::IdGenerator;
use application::error::AppError;
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

const NODE_ID_BITS: i64 = 10;
const SEQUENCE_BITS: i64 = 12;
const MAX_NODE_ID: i64 = (1 << NODE_ID_BITS) - 1;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_SHIFT: i64 = NODE_ID_BITS + SEQUENCE_BITS;
const NODE_ID_SHIFT: i64 = SEQUENCE_BITS;
const EPOCH: i64 = 1735689600000; // 2025-01-01 00:00:00 UTC

#[derive(Default)]
struct SnowflakeState {
    last_timestamp: i64,
    sequence: i64,
}

/// 雪花算法ID生成器
///
/// 同一毫秒内的ID严格递增，因此队列条目ID也可以作为同时点歌时的排序依据。
pub struct SnowflakeIdGenerator {
    node_id: i64,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeIdGenerator {
    pub fn new(node_id: i64) -> Result<Self, AppError> {
        if !(0..=MAX_NODE_ID).contains(&node_id) {
            return Err(AppError::InvalidInput(format!(
                "node id must be between 0 and {}, got {}",
                MAX_NODE_ID, node_id
            )));
        }

        Ok(Self {
            node_id,
            state: Mutex::new(SnowflakeState::default()),
        })
    }

    fn get_timestamp() -> Result<i64, AppError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .map_err(|e| AppError::UnknownError(format!("failed to read system time: {}", e)))
    }

    fn generate_id(&self, timestamp: i64, sequence: i64) -> i64 {
        ((timestamp - EPOCH) << TIMESTAMP_SHIFT) | (self.node_id << NODE_ID_SHIFT) | sequence
    }

    async fn wait_next_millis(last_timestamp: i64) -> Result<i64, AppError> {
        let mut timestamp = Self::get_timestamp()?;
        while timestamp <= last_timestamp {
            tokio::time::sleep(tokio::time::Duration::from_micros(100)).await;
            timestamp = Self::get_timestamp()?;
        }
        Ok(timestamp)
    }
}

#[async_trait]
impl IdGenerator for SnowflakeIdGenerator {
    async fn next_id(&self) -> Result<i64, AppError> {
        let mut state = self.state.lock().await;
        let mut timestamp = Self::get_timestamp()?;

        if timestamp < state.last_timestamp {
            return Err(AppError::UnknownError(
                "clock moved backwards, refusing to generate id".to_string(),
            ));
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                timestamp = Self::wait_next_millis(state.last_timestamp).await?;
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;
        Ok(self.generate_id(timestamp, state.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let generator = SnowflakeIdGenerator::new(1).unwrap();

        let mut ids = HashSet::new();
        let mut last = 0;
        for _ in 0..5000 {
            let id = generator.next_id().await.unwrap();
            assert!(id > last, "id {} not greater than {}", id, last);
            assert!(ids.insert(id), "duplicate id: {}", id);
            last = id;
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_never_collide() {
        let generator = Arc::new(SnowflakeIdGenerator::new(7).unwrap());
        let mut handles = vec![];
        for _ in 0..8 {
            let generator = generator.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = vec![];
                for _ in 0..200 {
                    ids.push(generator.next_id().await.unwrap());
                }
                ids
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(all.insert(id), "duplicate id: {}", id);
            }
        }
        assert_eq!(all.len(), 1600);
    }

    #[test]
    fn test_rejects_out_of_range_node_id() {
        assert!(SnowflakeIdGenerator::new(MAX_NODE_ID + 1).is_err());
        assert!(SnowflakeIdGenerator::new(-1).is_err());
    }
}
