//! Outbound duty-cycle packet as handed to a [`crate::Transport`].
//!
//! Binary layout and checksum are the transport's business; this is only the
//! logical content.

/// Control byte used for every duty-cycle packet (burst-less, broadcast-style).
pub const CONTROL_BYTE: u8 = 0xA2;
/// Message type of the climate-control command sent to valve drives.
pub const MESSAGE_TYPE_CLIMATE: u8 = 0x58;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyCyclePacket {
    pub message_counter: u8,
    pub control_byte: u8,
    pub message_type: u8,
    pub sender: u32,
    pub receiver: u32,
    pub payload: Vec<u8>,
}

impl DutyCyclePacket {
    /// Climate command `[command, valve]` from a thermostat to one valve drive.
    pub fn climate(message_counter: u8, sender: u32, receiver: u32, command: u8, valve: u8) -> Self {
        Self {
            message_counter,
            control_byte: CONTROL_BYTE,
            message_type: MESSAGE_TYPE_CLIMATE,
            sender,
            receiver,
            payload: vec![command, valve],
        }
    }

    pub fn command(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn valve_state(&self) -> Option<u8> {
        self.payload.get(1).copied()
    }
}
