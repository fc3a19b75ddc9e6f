use predict_types::{Address, U256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Who is calling, what they attached, and when the call is being applied.
///
/// Every ledger and authority operation receives one of these explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub value: U256,
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self {
            caller,
            value: U256::zero(),
            timestamp,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Context for a call the authority makes into the ledger on behalf of
    /// the current caller.
    pub fn relayed_by(&self, relay: Address) -> Self {
        Self {
            caller: relay,
            value: U256::zero(),
            timestamp: self.timestamp,
        }
    }
}

/// Source of call timestamps, in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn set(&self, timestamp: u64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(1_700_000_000);
        let other = clock.clone();
        clock.advance(12);
        assert_eq!(other.now(), 1_700_000_012);
        other.set(5);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn test_relayed_context_drops_value() {
        let user = Address::from_bytes([1; 20]);
        let relay = Address::from_bytes([2; 20]);
        let ctx = CallContext::new(user, 10).with_value(U256::from(7));
        let relayed = ctx.relayed_by(relay);
        assert_eq!(relayed.caller, relay);
        assert_eq!(relayed.value, U256::zero());
        assert_eq!(relayed.timestamp, 10);
    }
}
