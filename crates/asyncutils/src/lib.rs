//! Small [`futures::io`] adapters.
//!
//! - [`LazyReader`] defers opening a reader until the first read, so a body
//!   that is never consumed never costs a round-trip.
//! - [`MeteredReader`] records whether (and how much of) a reader was
//!   consumed, observable through a cloneable [`Meter`].

mod lazy;
mod metered;

pub use crate::lazy::LazyReader;
pub use crate::metered::{Meter, MeteredReader};
