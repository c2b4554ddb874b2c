// Serving status, independent of the retrieval path

use super::ipc::ServingStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared serving / not-serving flag
#[derive(Debug, Clone, Default)]
pub struct HealthReporter {
    serving: Arc<AtomicBool>,
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_serving(&self, serving: bool) {
        self.serving.store(serving, Ordering::SeqCst);
        tracing::info!("Health status set to {:?}", self.status());
    }

    pub fn status(&self) -> ServingStatus {
        if self.serving.load(Ordering::SeqCst) {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_not_serving() {
        let health = HealthReporter::new();
        assert_eq!(health.status(), ServingStatus::NotServing);
    }

    #[test]
    fn test_clones_share_state() {
        let health = HealthReporter::new();
        let observer = health.clone();

        health.set_serving(true);
        assert_eq!(observer.status(), ServingStatus::Serving);

        health.set_serving(false);
        assert_eq!(observer.status(), ServingStatus::NotServing);
    }
}
