//! Query sequencing for a search box.
//!
//! Queries arrive faster than shards load. [`SearchSession`] tags each one
//! with a [`Generation`] and surfaces only the outcome of the newest query;
//! [`SessionReducer`] is the pure state machine underneath it.

#![forbid(unsafe_code)]

mod reducer;
mod session;

pub use reducer::{Generation, Outcome, SessionReducer, SessionState};
pub use session::{SearchSession, Subscription};
