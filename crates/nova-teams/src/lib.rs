//! nova-teams: which team owns a tenant.
//!
//! Tenants are tagged with their owning team by convention: a tag ending
//! in a reserved suffix (`-team` by default) *is* the team name. Every
//! scrape consults this mapping for every server, so lookups must be
//! cheap and must never wait on the identity service.
//!
//! # Architecture
//!
//! ```text
//! TeamRefresher::run()            scrape tasks
//!   │ list_tenants()  (no lock)     │
//!   │ build TeamTable (no lock)     │ TeamCache::lookup_team()
//!   └─► TeamCache::replace() ──────►│   read lock, Arc clone
//!        write lock for the swap    │
//! ```
//!
//! A refresh builds the complete new table first and then swaps it in
//! under the write lock, so a reader sees one whole generation or the
//! next, never a mix.

pub mod cache;
pub mod refresh;

pub use cache::{RefreshOutcome, TeamCache, TeamTable, team_from_tags};
pub use refresh::{RetryBackoff, TeamRefresher};
