use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

/// Bounded memo store. Entries are evicted oldest-insertion-first once the capacity is
/// exceeded; reads never reorder them. Each key is computed at most once at a time:
/// concurrent misses on the same key wait for the caller already computing it.
pub struct ResultCache<K, V> {
    capacity: usize,
    state: Mutex<CacheState<K, V>>,
    settled: Condvar,
}

struct CacheState<K, V> {
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    in_flight: HashSet<K>,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                in_flight: HashSet::new(),
            }),
            settled: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> Vec<K> {
        self.lock().order.iter().cloned().collect()
    }

    /// Returns the stored value for `key`, or runs `compute` once and stores its output.
    /// Failures are handed back to the caller and leave the cache untouched.
    pub fn get_or_compute<F, E>(&self, key: &K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut state = self.lock();
        loop {
            if let Some(value) = state.entries.get(key) {
                return Ok(value.clone());
            }
            if !state.in_flight.contains(key) {
                break;
            }
            state = self
                .settled
                .wait(state)
                .expect("result cache mutex poisoned");
        }
        state.in_flight.insert(key.clone());
        drop(state);

        // Clears the reservation even if `compute` panics.
        let reservation = Reservation { cache: self, key };
        let outcome = compute();

        let mut state = self.lock();
        if let Ok(value) = &outcome {
            state.entries.insert(key.clone(), value.clone());
            state.order.push_back(key.clone());
            while state.entries.len() > self.capacity {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                state.entries.remove(&oldest);
                debug!(capacity = self.capacity, "evicted oldest cached result");
            }
        }
        drop(state);
        drop(reservation);

        outcome
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().expect("result cache mutex poisoned")
    }
}

struct Reservation<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    cache: &'a ResultCache<K, V>,
    key: &'a K,
}

impl<K, V> Drop for Reservation<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        // A poisoned lock still holds consistent bookkeeping for the in-flight set.
        let mut state = match self.cache.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.in_flight.remove(self.key);
        drop(state);
        self.cache.settled.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    fn key(value: &str) -> String {
        value.to_string()
    }

    #[test]
    fn hit_returns_first_value_without_recomputing() {
        let cache = ResultCache::new(3);
        let first: Result<u32, ()> = cache.get_or_compute(&key("X"), || Ok(1));
        assert_eq!(first, Ok(1));

        let second: Result<u32, ()> =
            cache.get_or_compute(&key("X"), || panic!("must not recompute a cached key"));
        assert_eq!(second, Ok(1));
    }

    #[test]
    fn eviction_is_fifo_even_after_reads() {
        let cache = ResultCache::new(3);
        for name in ["A", "B", "C"] {
            let _: Result<&str, ()> = cache.get_or_compute(&key(name), || Ok(name));
        }

        // Reading A does not refresh its position.
        let _: Result<&str, ()> = cache.get_or_compute(&key("A"), || Ok("recomputed"));
        assert_eq!(cache.get(&key("A")), Some("A"));

        let _: Result<&str, ()> = cache.get_or_compute(&key("D"), || Ok("D"));
        assert_eq!(cache.keys(), vec![key("B"), key("C"), key("D")]);
        assert!(!cache.contains(&key("A")));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn failures_are_not_cached_and_can_be_retried() {
        let cache: ResultCache<String, u32> = ResultCache::new(2);
        let failed: Result<u32, &str> = cache.get_or_compute(&key("Y"), || Err("scorer down"));
        assert_eq!(failed, Err("scorer down"));
        assert!(!cache.contains(&key("Y")));
        assert!(cache.is_empty());

        let retried: Result<u32, &str> = cache.get_or_compute(&key("Y"), || Ok(7));
        assert_eq!(retried, Ok(7));
        assert!(cache.contains(&key("Y")));
    }

    #[test]
    fn concurrent_misses_on_one_key_compute_once() {
        let cache = Arc::new(ResultCache::new(8));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let result: Result<usize, ()> = cache.get_or_compute(&key("same"), || {
                        thread::sleep(Duration::from_millis(50));
                        Ok(calls.fetch_add(1, Ordering::SeqCst))
                    });
                    result
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().expect("worker joins"), Ok(0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn waiter_recomputes_after_in_flight_failure() {
        let cache: Arc<ResultCache<String, u32>> = Arc::new(ResultCache::new(4));
        let started = Arc::new(Barrier::new(2));

        let failing = {
            let cache = Arc::clone(&cache);
            let started = Arc::clone(&started);
            thread::spawn(move || {
                cache.get_or_compute(&key("Z"), || {
                    started.wait();
                    thread::sleep(Duration::from_millis(50));
                    Err::<u32, &str>("boom")
                })
            })
        };

        started.wait();
        let retried: Result<u32, &str> = cache.get_or_compute(&key("Z"), || Ok(9));

        assert_eq!(failing.join().expect("worker joins"), Err("boom"));
        assert_eq!(retried, Ok(9));
        assert_eq!(cache.get(&key("Z")), Some(9));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let cache: ResultCache<String, u32> = ResultCache::new(0);
        assert_eq!(cache.capacity(), 1);
        let _: Result<u32, ()> = cache.get_or_compute(&key("a"), || Ok(1));
        let _: Result<u32, ()> = cache.get_or_compute(&key("b"), || Ok(2));
        assert_eq!(cache.keys(), vec![key("b")]);
    }
}
