//! Read models derived from the season log.
//!
//! Every function here is a pure fold over an ordered slice of
//! [`EventRecord`](pinwheel_protocol::EventRecord)s: no I/O, no clocks, no
//! shared state. Folding the same prefix twice yields the same view, so
//! callers may cache a result keyed on the season's head sequence and
//! rebuild it from the log at any time.

mod balances;
mod replay;
mod standings;
mod trades;

pub use balances::{BalanceFold, fold_balances};
pub use replay::SeasonProjection;
pub use standings::{TeamStanding, compute_standings, standings_from_events};
pub use trades::{TradeFold, fold_trades};
