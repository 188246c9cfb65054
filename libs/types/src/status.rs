//! Admission queue status snapshot

use serde::{Deserialize, Serialize};

/// Point-in-time view of the admission queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Keys currently admitted
    pub processing: usize,

    /// Global capacity
    pub max_concurrent: usize,
}

impl QueueStatus {
    /// Slots still available
    pub fn available(&self) -> usize {
        self.max_concurrent.saturating_sub(self.processing)
    }

    pub fn is_full(&self) -> bool {
        self.processing >= self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_camel_case() {
        let status = QueueStatus {
            processing: 3,
            max_concurrent: 3,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"processing":3,"maxConcurrent":3}"#);
        assert!(status.is_full());
        assert_eq!(status.available(), 0);
    }
}
