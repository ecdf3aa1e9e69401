//! Frontier tracking for listing discovery.
//!
//! A listing page is scrolled round by round; each round's snapshot yields
//! anchor ids that are folded into a [`FrontierState`]. The
//! [`FrontierTracker`] decides when enough new ids have accumulated to
//! process a batch and when the listing is exhausted.

pub mod config;
mod listing;
mod state;
mod tracker;

pub use config::FrontierConfig;
pub use listing::ListingIds;
pub use state::FrontierState;
pub use tracker::{FrontierTracker, RoundOutcome};
