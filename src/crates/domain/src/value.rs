use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

// Helper macro to define aggregate ID newtypes and common trait impls
macro_rules! define_id {
    ($name:ident $(, $extra:ident)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize $(, $extra)*)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(SongId, Eq, Hash);
define_id!(UserId, Eq, Hash);
define_id!(QueueEntryId, Eq, Hash, PartialOrd, Ord);
define_id!(JukeboxId, Eq, Hash);

/// 店内只有一台实体点唱机，所有用户共享同一个队列
impl Default for JukeboxId {
    fn default() -> Self {
        Self(1)
    }
}
