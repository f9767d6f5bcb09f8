use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::db::memory_service::new_id;
use crate::workflows::car_form::CarForm;

/// One open car form. Only its owner may read or change it.
#[derive(Debug)]
pub struct Draft {
    pub owner_id: String,
    pub form: Mutex<CarForm>,
    /// Milliseconds since the store's epoch.
    touched_at: AtomicU64,
    /// Store-wide use counter, orders drafts touched within the same millisecond.
    last_use: AtomicU64,
}

impl Draft {
    fn touched_at(&self) -> u64 {
        self.touched_at.load(Ordering::Relaxed)
    }

    fn last_use(&self) -> u64 {
        self.last_use.load(Ordering::Relaxed)
    }
}

/// Server-side car forms keyed by draft id.
///
/// Drafts are dropped when idle for too long, when their owner opens more
/// than `max_per_owner` of them (oldest first), or when the owner is deleted.
#[derive(Debug, Clone)]
pub struct DraftStore {
    drafts: Arc<DashMap<String, Arc<Draft>>>,
    epoch: Instant,
    uses: Arc<AtomicU64>,
    max_per_owner: usize,
}

impl DraftStore {
    pub fn new(max_per_owner: usize) -> Self {
        Self {
            drafts: Arc::new(DashMap::new()),
            epoch: Instant::now(),
            uses: Arc::new(AtomicU64::new(0)),
            max_per_owner: max_per_owner.max(1),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn next_use(&self) -> u64 {
        self.uses.fetch_add(1, Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn count_owned_by(&self, owner_id: &str) -> usize {
        self.drafts
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id)
            .count()
    }

    /// Stores a new draft and returns its id.
    pub fn insert(&self, owner_id: &str, form: CarForm) -> String {
        let mut owned: Vec<(u64, String)> = self
            .drafts
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id)
            .map(|entry| (entry.value().last_use(), entry.key().clone()))
            .collect();
        if owned.len() >= self.max_per_owner {
            owned.sort();
            let excess = owned.len() + 1 - self.max_per_owner;
            for (_, id) in owned.into_iter().take(excess) {
                self.drafts.remove(&id);
                debug!(draft_id = %id, owner_id = %owner_id, "Oldest draft dropped to make room.");
            }
        }

        let id = new_id();
        self.drafts.insert(
            id.clone(),
            Arc::new(Draft {
                owner_id: owner_id.to_string(),
                form: Mutex::new(form),
                touched_at: AtomicU64::new(self.now_ms()),
                last_use: AtomicU64::new(self.next_use()),
            }),
        );
        id
    }

    /// Looks up a draft owned by `owner_id` and marks it as used.
    /// The map guard is released before the caller locks the form.
    pub fn get(&self, id: &str, owner_id: &str) -> Option<Arc<Draft>> {
        let draft = self
            .drafts
            .get(id)
            .map(|entry| entry.value().clone())
            .filter(|draft| draft.owner_id == owner_id)?;
        draft.touched_at.store(self.now_ms(), Ordering::Relaxed);
        draft.last_use.store(self.next_use(), Ordering::Relaxed);
        Some(draft)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.drafts.remove(id).is_some()
    }

    /// Drops every draft belonging to `owner_id`.
    pub fn remove_owned_by(&self, owner_id: &str) -> usize {
        let before = self.drafts.len();
        self.drafts.retain(|_, draft| draft.owner_id != owner_id);
        before.saturating_sub(self.drafts.len())
    }

    /// Drops drafts untouched for longer than `max_idle`. A draft whose form is
    /// locked by a running request is kept.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = self.now_ms();
        let max_idle_ms = max_idle.as_millis() as u64;
        let before = self.drafts.len();
        self.drafts.retain(|_, draft| {
            now.saturating_sub(draft.touched_at()) <= max_idle_ms || draft.form.try_lock().is_err()
        });
        before.saturating_sub(self.drafts.len())
    }

    /// Periodically evicts idle drafts until the runtime shuts down.
    pub fn spawn_sweeper(&self, max_idle: Duration, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;
                let evicted = store.evict_idle(max_idle);
                if evicted > 0 {
                    info!(evicted, remaining = store.len(), "Evicted idle drafts.");
                }
            }
        })
    }
}
