//! Query side of the order engine.
//!
//! [`ProjectionProcessor`] reads the global event log and feeds each
//! registered [`Projection`]. [`OrderSearchView`] is the read model behind
//! order listing and search.

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{OrderSearch, OrderSearchView, OrderSummary};
