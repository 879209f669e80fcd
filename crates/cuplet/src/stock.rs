//! Cup stock accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Remaining consumable stock plus a diagnostic count of cups made.
///
/// `consume` saturates at zero; admission control in the lock protocol is
/// what actually prevents an operation from starting on an empty stock.
pub struct CupStock {
    remaining: AtomicU64,
    made: AtomicU64,
}

impl CupStock {
    pub fn new(initial: u64) -> Self {
        Self {
            remaining: AtomicU64::new(initial),
            made: AtomicU64::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn cups_made(&self) -> u64 {
        self.made.load(Ordering::Acquire)
    }

    /// Consume one cup. Returns true when this consumption emptied the stock.
    pub fn consume(&self) -> bool {
        self.made.fetch_add(1, Ordering::AcqRel);
        matches!(
            self.remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)),
            Ok(1)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_counts_down_and_up() {
        let stock = CupStock::new(3);

        assert!(!stock.consume());
        assert_eq!(stock.remaining(), 2);
        assert_eq!(stock.cups_made(), 1);
    }

    #[test]
    fn consume_reports_exhaustion_exactly_once() {
        let stock = CupStock::new(2);

        assert!(!stock.consume());
        assert!(stock.consume());
        assert!(stock.is_empty());

        // Saturates at zero, never reports exhaustion again.
        assert!(!stock.consume());
        assert_eq!(stock.remaining(), 0);
        assert_eq!(stock.cups_made(), 3);
    }

    #[test]
    fn starts_empty_at_zero() {
        let stock = CupStock::new(0);
        assert!(stock.is_empty());
        assert!(!stock.consume());
        assert_eq!(stock.remaining(), 0);
    }
}
