//! SPI commands for the master and slave SSD1683 halves (spec §4.3.2).
//!
//! The master's opcode table is the familiar SSD168x family also seen in
//! single-controller panels of this generation; the slave half answers to
//! a second, mostly-parallel set of opcodes at different addresses.

/// Commands addressed to the master controller (left half, bytes 0..49).
#[allow(non_camel_case_types)]
#[derive(Clone, Copy)]
pub(crate) enum Command {
    /// Software reset.
    SW_RESET = 0x12,
    /// Data entry mode (X-increment, Y-decrement when data = 0x05).
    DATA_ENTRY_MODE_SETTING = 0x11,
    /// Border waveform control.
    BORDER_WAVEFORM_CONTROL = 0x3C,
    /// Temperature sensor selection.
    TEMPERATURE_SENSOR_CONTROL_WRITE = 0x18,
    /// Set RAM X address start/end.
    SET_RAM_X_ADDRESS_START_END_POSITION = 0x44,
    /// Set RAM Y address start/end.
    SET_RAM_Y_ADDRESS_START_END_POSITION = 0x45,
    /// Set RAM X address counter.
    SET_RAM_X_ADDRESS_COUNTER = 0x4E,
    /// Set RAM Y address counter.
    SET_RAM_Y_ADDRESS_COUNTER = 0x4F,
    /// Write NEW RAM.
    WRITE_RAM = 0x24,
    /// Write OLD RAM.
    WRITE_RAM_OLD = 0x26,
    /// Display update control 2 (selects full/partial waveform).
    DISPLAY_UPDATE_CONTROL_2 = 0x22,
    /// Master activation: triggers the update selected above.
    MASTER_ACTIVATION = 0x20,
}

impl crate::panel::Opcode for Command {
    fn address(self) -> u8 {
        self as u8
    }
}

/// Commands addressed to the slave controller (right half, bytes 49..98,
/// reversed X addressing — spec §4.3.2).
#[allow(non_camel_case_types)]
#[derive(Clone, Copy)]
pub(crate) enum SlaveCommand {
    /// Data entry mode for the slave half.
    DATA_ENTRY_MODE_SETTING = 0x91,
    /// Set RAM X address start/end (slave-local coordinates).
    SET_RAM_X_ADDRESS_START_END_POSITION = 0xC4,
    /// Set RAM Y address start/end.
    SET_RAM_Y_ADDRESS_START_END_POSITION = 0xC5,
    /// Set RAM X address counter (slave-local coordinate).
    SET_RAM_X_ADDRESS_COUNTER = 0xCE,
    /// Set RAM Y address counter.
    SET_RAM_Y_ADDRESS_COUNTER = 0xCF,
    /// Write NEW RAM.
    WRITE_RAM = 0xA4,
    /// Write OLD RAM.
    WRITE_RAM_OLD = 0xA6,
}

impl crate::panel::Opcode for SlaveCommand {
    fn address(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::Opcode;

    #[test]
    fn master_addresses() {
        assert_eq!(Command::WRITE_RAM.address(), 0x24);
        assert_eq!(Command::WRITE_RAM_OLD.address(), 0x26);
        assert_eq!(Command::MASTER_ACTIVATION.address(), 0x20);
    }

    #[test]
    fn slave_addresses() {
        assert_eq!(SlaveCommand::DATA_ENTRY_MODE_SETTING.address(), 0x91);
        assert_eq!(SlaveCommand::WRITE_RAM.address(), 0xA4);
        assert_eq!(SlaveCommand::WRITE_RAM_OLD.address(), 0xA6);
    }
}
