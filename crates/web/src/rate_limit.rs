use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// Stale keys are swept once the map grows past this; the actor table is
// the practical upper bound on keys.
const SWEEP_THRESHOLD: usize = 4096;

/// Sliding-window limiter for write actions, keyed by viewer id.
/// A limit of 0 disables limiting.
#[derive(Clone)]
pub struct WriteLimiter {
    window: Duration,
    events: Arc<Mutex<HashMap<i64, VecDeque<Instant>>>>,
}

impl WriteLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn allow(&self, viewer_id: i64, limit: u32) -> bool {
        if limit == 0 {
            return true;
        }

        let now = Instant::now();
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let queue = events.entry(viewer_id).or_default();
        while queue
            .front()
            .is_some_and(|at| now.duration_since(*at) > self.window)
        {
            queue.pop_front();
        }

        if queue.len() >= limit as usize {
            return false;
        }
        queue.push_back(now);

        if events.len() > SWEEP_THRESHOLD {
            let window = self.window;
            events.retain(|_, queue| {
                queue
                    .back()
                    .is_some_and(|at| now.duration_since(*at) <= window)
            });
        }

        true
    }
}
