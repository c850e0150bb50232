//! Core types used throughout the system
//!
//! Row identities are Postgres `BIGSERIAL` values and stay `i64` end to end.

/// Account ID - assigned by the store, immutable, always > 0.
///
/// # Ordering:
/// Account IDs are totally ordered. The transfer engine relies on this order
/// to acquire account row locks lower-id-first:
/// ```ignore
/// let (first, second) = if from < to { (from, to) } else { (to, from) };
/// ```
pub type AccountId = i64;

/// Entry ID - one ledger line item
pub type EntryId = i64;

/// Transfer ID - one funds movement
pub type TransferId = i64;

/// Amount in the smallest currency unit (cents for USD)
pub type Amount = i64;
