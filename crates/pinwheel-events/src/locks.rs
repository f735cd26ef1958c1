use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pinwheel_protocol::SeasonId;
use tokio::sync::OwnedMutexGuard;

/// Per-season writer locks. Services that read a projection, validate
/// against it and then append hold the season's lock for the whole
/// read-validate-append sequence so that only one writer acts on a season
/// at a time. Reads never take it.
#[derive(Debug, Clone, Default)]
pub struct SeasonLocks {
    locks: Arc<Mutex<HashMap<SeasonId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SeasonLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, season_id: &SeasonId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.locks.lock();
        guard
            .entry(season_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    pub async fn acquire(&self, season_id: &SeasonId) -> OwnedMutexGuard<()> {
        self.lock_for(season_id).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_season_writers_are_serialized() {
        let locks = SeasonLocks::new();
        let season = SeasonId::from("S1");
        let held = locks.acquire(&season).await;

        let contender = {
            let locks = locks.clone();
            let season = season.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&season).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .expect("contender task should not panic");
    }

    #[tokio::test]
    async fn different_seasons_do_not_contend() {
        let locks = SeasonLocks::new();
        let _first = locks.acquire(&SeasonId::from("S1")).await;
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&SeasonId::from("S2")),
        )
        .await;
        assert!(second.is_ok());
    }
}
