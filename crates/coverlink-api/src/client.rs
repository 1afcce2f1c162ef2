// ── Device client capability ──
//
// The seam between the cache/entity layer and whatever speaks the vendor
// protocol. Implementations own framing, encryption and sockets; callers
// only see whole snapshots and single data-point writes.

use std::future::Future;
use std::sync::Arc;

use crate::dp::{DpIndex, DpValue, StateSnapshot};
use crate::error::Error;

/// Operations every local device client offers.
///
/// Each call is one exchange with the device and may fail with a
/// connectivity error (see [`Error::is_connectivity`]). Implementations do
/// not retry; that policy lives one layer up.
pub trait DeviceClient: Send + Sync + 'static {
    /// Vendor identifier of the device this client talks to.
    fn device_id(&self) -> &str;

    /// Read every data point in one round trip.
    fn status(&self) -> impl Future<Output = Result<StateSnapshot, Error>> + Send;

    /// Write a single data point.
    fn set_value(
        &self,
        index: DpIndex,
        value: DpValue,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Switch a boolean data point on or off.
    fn set_status(
        &self,
        on: bool,
        index: DpIndex,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        self.set_value(index, DpValue::Bool(on))
    }
}

impl<C: DeviceClient> DeviceClient for Arc<C> {
    fn device_id(&self) -> &str {
        (**self).device_id()
    }

    fn status(&self) -> impl Future<Output = Result<StateSnapshot, Error>> + Send {
        (**self).status()
    }

    fn set_value(
        &self,
        index: DpIndex,
        value: DpValue,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).set_value(index, value)
    }

    fn set_status(
        &self,
        on: bool,
        index: DpIndex,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).set_status(on, index)
    }
}
