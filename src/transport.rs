use crate::Result;
use std::time::Duration;

/// Byte-level access to the sensor, owned by the reader thread.
///
/// `read` returns `Ok(0)` when no report arrived and `Err(TrackerError::Timeout)`
/// when the transfer timed out; both are routine. Any other error counts
/// towards the stream's consecutive-error limit.
pub trait Transport: Send {
    /// Send the one-shot handshake that starts the sensor stream.
    fn enable_sensor_stream(&mut self) -> Result<()>;

    /// Read one report into `buf`, waiting at most `timeout`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Size of the buffer `read` should be handed.
    fn report_size(&self) -> usize {
        crate::protocol::FRAME_SIZE
    }

    /// Release the interface and close the handle. Safe to call twice.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn enable_sensor_stream(&mut self) -> Result<()> {
        (**self).enable_sensor_stream()
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn report_size(&self) -> usize {
        (**self).report_size()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
