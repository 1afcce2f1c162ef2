//! Device-side building blocks for local-network window coverings.
//!
//! - **[`DeviceClient`]**: the capability every device connection offers:
//!   whole-snapshot status reads plus single data-point writes.
//! - **[`StateSnapshot`] / [`DpValue`]**: the data-point model shared by
//!   clients, the status cache and cover entities.
//! - **[`Error`]**: transport taxonomy with
//!   [`is_connectivity()`](Error::is_connectivity) marking what is worth retrying.
//! - **[`SimulatedCover`]**: an in-process motorised cover for tests and
//!   dry runs.

pub mod client;
pub mod dp;
pub mod error;
pub mod settings;
pub mod sim;

pub use client::DeviceClient;
pub use dp::{DpIndex, DpValue, StateSnapshot};
pub use error::Error;
pub use settings::{DEFAULT_PORT, DeviceSettings, ProtocolVersion};
pub use sim::{Fault, SimLayout, SimulatedCover};
