//! Sample acquisition boundary

use nalgebra::Vector3;

/// Source of raw accelerometer samples, implemented by the surrounding
/// device driver.
///
/// The calibration engine only borrows the source for the duration of each
/// read; it never takes ownership of the underlying bus handle. Reads are
/// infallible at this layer because hardware faults are the implementor's
/// concern, not the calibration engine's.
///
/// Tests implement this trait with scripted sample sequences, which makes
/// the whole collection protocol runnable without hardware.
pub trait SampleSource {
    /// Read one raw accelerometer sample, in whatever counts the device
    /// produces. May block while the hardware settles on a reading.
    fn read_accelerometer(&mut self) -> Vector3<f64>;

    /// Current device configuration (ranges, data rates and the like),
    /// captured once per calibration run for provenance. The engine stores
    /// the value verbatim and never interprets it.
    fn device_settings(&self) -> serde_json::Value;
}
