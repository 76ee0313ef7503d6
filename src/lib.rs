//! # vonat-tracker
//!
//! Polls the MÁV live train-position feed on a fixed interval,
//! normalizes each snapshot, and appends it to a SQLite database with
//! dimension tables deduplicating the repeated categorical fields. A
//! small HTTP component serves the database file for authenticated
//! download.
//!
//! ## Architecture
//!
//! ```text
//! Upstream feed (vonatinfo.mav-start.hu)
//!     │
//!     ├── TrainsClient (upstream)        one POST per cycle
//!     ├── extract / normalize (domain)   snapshot → canonical records
//!     ├── Store (persistence)            dimensions + fact rows, SQLite
//!     ├── Scheduler (scheduler)          fixed interval, capped overlap
//!     │
//!     └── File server (server)           GET /health, GET /{archive}
//! ```
//!
//! Every cycle is one transaction; a failed cycle logs and the next
//! tick starts clean. The process runs until interrupted or until the
//! optional self-termination timer fires.

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod scheduler;
pub mod server;
pub mod upstream;
