use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BusId(pub u64);

// fancy atomic counter lets any thread holding the engine mint bus ids
#[derive(Debug, Default)]
pub struct BusIds {
    next: AtomicU64,
}

impl BusIds {
    pub fn next_id(&self) -> BusId {
        BusId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
