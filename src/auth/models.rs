use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a request acts for. `Local` is the fallback when no usable guest id
/// was presented; records saved under it are reachable by nobody else.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Guest(Uuid),
    Local(Uuid),
}

impl Subject {
    pub fn user_id(&self) -> Uuid {
        match self {
            Subject::Guest(id) | Subject::Local(id) => *id,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Subject::Local(_))
    }
}
