//! Consistency core of the school administration console.
//!
//! The hosted document store keeps classes, students and teachers in
//! independent collections with denormalized counters pointing across
//! them, and offers no multi-document transaction. This crate owns the
//! rules that keep those counters roughly coherent anyway: the pure
//! reconciler computes compensating writes for each mutation, the
//! orchestrator sequences primary write then compensations, and the
//! entity store mirrors each collection's change feed for the screens.
//! Rendering, routing and the auth protocol live elsewhere.

pub mod context;
pub mod error;
pub mod identity;
pub mod model;
pub mod orchestrate;
pub mod persist;
pub mod reconcile;
pub mod store;

pub use context::AppContext;
pub use error::{LoginError, OpError, PersistError};
