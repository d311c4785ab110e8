use core::sync::atomic::{AtomicU64, Ordering};

/// Version counter for planning requests. Each edit takes a new ticket; a
/// planner holding an older ticket gives up at its next checkpoint.
#[derive(Debug, Default)]
pub struct PlanGeneration {
    current: AtomicU64,
}

impl PlanGeneration {
    pub const fn new() -> Self {
        PlanGeneration {
            current: AtomicU64::new(0),
        }
    }

    /// Starts a new request and returns its ticket.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.current() == ticket
    }
}

#[cfg(feature = "std")]
pub use latest::LatestPlan;

#[cfg(feature = "std")]
mod latest {
    use std::sync::{Arc, RwLock};

    use crate::plan::Plan;

    /// Single writer, many readers hand-off of the newest finished plan.
    /// Plans are never mutated once published; readers keep their `Arc`.
    #[derive(Debug, Default)]
    pub struct LatestPlan {
        slot: RwLock<Option<(u64, Arc<Plan>)>>,
    }

    impl LatestPlan {
        pub fn new() -> Self {
            LatestPlan::default()
        }

        /// Stores `plan` unless a plan from a newer ticket is already there.
        pub fn publish(&self, ticket: u64, plan: Plan) -> bool {
            let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
            if matches!(*slot, Some((stored, _)) if stored > ticket) {
                return false;
            }
            *slot = Some((ticket, Arc::new(plan)));
            true
        }

        pub fn latest(&self) -> Option<Arc<Plan>> {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            slot.as_ref().map(|(_, plan)| Arc::clone(plan))
        }

        pub fn latest_ticket(&self) -> Option<u64> {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            slot.as_ref().map(|(ticket, _)| *ticket)
        }
    }
}
