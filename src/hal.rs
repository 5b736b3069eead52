//! Thin hardware-abstraction shim consumed by the panel driver and the
//! application loop.
//!
//! Board bring-up (clocks, USB enumeration) and the concrete GPIO/SPI
//! peripheral drivers live outside this crate; implementors provide a
//! single [`Hal`] that multiplexes CS/DC/RST/BUSY onto whatever pins the
//! board wiring uses.

/// The four GPIO lines the panel driver touches.
///
/// The master and slave SSD1683 halves share one physical CS/DC/RST/BUSY
/// set on this board (they are distinguished purely by which command
/// opcode is sent, see [`crate::command`]), so unlike a quad-chip panel
/// there is no per-half pin to select here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pin {
    /// Chip select, active low.
    Cs,
    /// Command/data select; low selects command, high selects data.
    Dc,
    /// Reset, active low.
    Rst,
    /// Busy input from the controller.
    Busy,
}

/// Operations the panel driver and application loop require of the board.
///
/// `sleep_ms`/`monotonic_us`/the serial operations are infallible by
/// design: a board that cannot sleep or read its own clock has no
/// meaningful error to report, and a dropped or truncated serial write is
/// not distinguishable from a host that stopped reading, which this core
/// is not required to detect (see spec §5).
pub trait Hal {
    /// Error type for the fallible GPIO/SPI operations.
    type Error;

    /// Drive `pin` to `level` (`true` = high).
    fn gpio_set(&mut self, pin: Pin, level: bool) -> Result<(), Self::Error>;

    /// Read the current level of `pin` (`true` = high).
    fn gpio_read(&mut self, pin: Pin) -> Result<bool, Self::Error>;

    /// Write `bytes` on the SPI bus while CS is asserted by the caller.
    fn spi_write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Busy-sleep for approximately `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u32);

    /// Free-running microsecond clock, used for parser and BUSY timeouts.
    fn monotonic_us(&self) -> u64;

    /// Poll the transport for one byte without blocking.
    fn serial_read_byte_nonblocking(&mut self) -> Option<u8>;

    /// Queue bytes for transmission on the transport.
    fn serial_write_bytes(&mut self, bytes: &[u8]);

    /// Block until queued transport writes have been sent.
    fn serial_flush(&mut self);
}
