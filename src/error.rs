//! Error types surfaced by the panel driver.
//!
//! The parser and frame-validation layers deliberately do not use this
//! type: malformed transport input is an expected, silently recoverable
//! condition (spec §7), not an error. `PanelError` is reserved for actual
//! HAL/hardware failures.

use core::fmt::{Debug, Display, Formatter};

use crate::hal::Hal;

/// Error produced by a [`crate::panel::PanelDriver`] operation.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError<H>
where
    H: Hal,
{
    /// A HAL GPIO or SPI call returned an error.
    Hal(H::Error),
    /// `wait_idle` exceeded its bound; the driver proceeded anyway
    /// (vendor behavior, see spec §4.3.5/§7).
    Busy,
    /// A driver call was made before `init` completed. Never returned
    /// from the public API (the call is a defensive no-op instead, see
    /// spec §7); this variant exists so the rejection can be logged and
    /// inspected via [`crate::panel::PanelDriver::last_rejection`].
    Uninitialized,
}

impl<H> Debug for PanelError<H>
where
    H: Hal,
    H::Error: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Hal(e) => f.debug_tuple("Hal").field(e).finish(),
            Self::Busy => f.write_str("Busy"),
            Self::Uninitialized => f.write_str("Uninitialized"),
        }
    }
}

impl<H> Display for PanelError<H>
where
    H: Hal,
    H::Error: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Hal(e) => Display::fmt(e, f),
            Self::Busy => write!(f, "panel BUSY did not clear within the timeout"),
            Self::Uninitialized => write!(f, "panel driver call rejected: not initialized"),
        }
    }
}

impl<H> From<H::Error> for PanelError<H>
where
    H: Hal,
{
    fn from(e: H::Error) -> Self {
        PanelError::Hal(e)
    }
}
