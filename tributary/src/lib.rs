//! # Tributary
//!
//! Ordered stream readers for event-sourced projections.

#![deny(missing_docs)]

#[cfg(feature = "in-memory")]
/// Tokio runtime and in-memory log for the `tributary` crate.
pub mod mem {
    //! Runs readers on tokio against an in-memory commit log.
    pub use tributary_mem::*;
}

pub mod prelude {
    //! The prelude module for the `tributary` crate.
    pub use tributary_core::prelude::*;

    #[cfg(feature = "in-memory")]
    pub use super::mem::*;
}
