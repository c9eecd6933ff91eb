//! # Conference Core
//!
//! Domain model and pure logic for the Conference Central backend.
//!
//! This crate has no I/O. It defines:
//!
//! - **Entities**: [`Profile`], [`Conference`], [`Session`], [`WishlistEntry`]
//!   and their strong key types
//! - **Filter compiler**: client filter triples to a validated [`QueryPlan`]
//! - **Registration transitions**: seat accounting on a profile/conference pair
//! - **Storage seam**: the dyn-compatible [`EntityStore`] trait with atomic,
//!   versioned commits
//! - **Environment seams**: clock, notification queue, announcement cache, email
//! - **Wire forms**: camelCase messages and explicit entity mappings
//!
//! ## Architecture
//!
//! Functional core, imperative shell: everything that decides something
//! lives here and is tested without a database. `conference-runtime`
//! loads entities through the store, calls into this crate and commits the
//! result.

pub use chrono::{DateTime, Utc};

pub mod environment;
pub mod error;
pub mod filter;
pub mod forms;
pub mod identity;
pub mod keys;
pub mod model;
pub mod registration;
pub mod store;

pub use error::{ConferenceError, ErrorKind};
pub use filter::{FilterError, FilterSpec, QueryPlan, compile};
pub use identity::CallerIdentity;
pub use keys::{ConferenceKey, ProfileId, SessionKey, Version, WishlistKey};
pub use model::{Conference, Profile, Session, TeeShirtSize, Versioned, WishlistEntry};
pub use store::{EntityStore, Expectation, Mutation, SessionQuery, StoreError, StoreFuture};
