//! Database access layer
//!
//! Plain async functions over `&PgPool`. Every state transition is a
//! single-statement conditional update; the returned `rows_affected` is
//! the signal for whether the transition actually happened (0 = no-op).

pub mod audit;
pub mod escrows;
pub mod orders;
pub mod transactions;
pub mod users;
