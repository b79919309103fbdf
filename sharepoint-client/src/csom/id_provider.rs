//! Request-local id assignment
//!
//! Every object-path and action node in one physical request carries a
//! process-unique integer id. Ids are strictly increasing, never reused even
//! when a node is discarded, and request-local: a fresh provider is created
//! for every physical-request build. The `&mut` receiver confines a provider
//! to the single build pass.

/// Monotonically increasing id source for one physical request.
#[derive(Debug)]
pub struct IdProvider {
    next: i32,
}

/// First id handed out by a fresh provider.
const ID_SEED: i32 = 1;

impl IdProvider {
    pub fn new() -> Self {
        Self { next: ID_SEED }
    }

    pub fn next_id(&mut self) -> i32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Ids handed out so far.
    pub fn issued(&self) -> i32 {
        self.next - ID_SEED
    }
}

impl Default for IdProvider {
    fn default() -> Self {
        Self::new()
    }
}
