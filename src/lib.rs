//! Firmware core for a USB-attached driver of a dual-controller 792×272
//! monochrome e-paper panel (SSD1683 controller pair, GDEY0579T93 glass).
//!
//! This crate owns the panel state machine and the framing/transport
//! parser; it does not own clocks, USB enumeration, or GPIO/SPI
//! peripheral setup — those live in a board-specific binary behind the
//! [`hal::Hal`] shim.
//!
//! Data flow: bytes → [`parser`] → validated [`frame::Frame`] →
//! [`app`] → [`panel::PanelDriver`] operation → SPI → panel; on
//! completion, an `OK` acknowledgement is written back to the transport.
#![no_std]

pub mod app;
mod command;
pub mod crc32;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod hal;
pub mod panel;
pub mod parser;

pub mod prelude {
    pub use crate::app::App;
    pub use crate::error::PanelError;
    pub use crate::frame::{Frame, RectHeader};
    pub use crate::geometry::{FRAME_BYTES, HEIGHT, WIDTH};
    pub use crate::hal::{Hal, Pin};
    pub use crate::panel::{PanelConfig, PanelDriver};
    pub use crate::parser::ParserEvent;
}
