use crate::onewire::SensorAddress;

#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum SensorError {
    /// Reset pulse saw no presence response on the bus.
    NoDevices,
    /// Pin operation failed.
    Gpio,
    /// ROM code or scratchpad failed the CRC check.
    CrcMismatch,
    /// A sensor answered on the bus that no device entry covers.
    UnknownSensor(SensorAddress),
    /// A configured device entry matched no sensor on the bus.
    SensorMissing(&'static str),
    /// A formatted value or request did not fit its buffer.
    BufferOverflow,
    Network,
    Timeout,
    /// Server answered with a non-success HTTP status.
    Status(u16),
}
