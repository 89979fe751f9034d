use std::sync::{
    OnceLock,
    atomic::{AtomicU64, Ordering},
};

/// Returns a process-unique, monotonically increasing identifier.
///
/// The counter starts at a random offset so ids from a restarted server do not repeat the
/// previous run's sequence.
pub fn rand_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(u64::from(rand::random::<u32>())));
    counter.fetch_add(1, Ordering::Relaxed)
}

/// `prefix-<hex>` identifier for generated room and guest ids.
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}-{:x}", rand_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = rand_id();
        let b = rand_id();
        assert!(b > a);
        assert_ne!(prefixed_id("room"), prefixed_id("room"));
        assert!(prefixed_id("guest").starts_with("guest-"));
    }
}
