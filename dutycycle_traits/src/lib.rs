pub mod clock;
pub mod packet;

pub use clock::{Clock, MonotonicClock};
pub use packet::DutyCyclePacket;

/// Radio transport that hands a packet to the physical interface.
///
/// Fire-and-forget: `Ok(())` means the packet was accepted for transmission,
/// not that any actuator received it.
pub trait Transport {
    fn send(&self, packet: &DutyCyclePacket) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Keyed integer store used for peer variables that must survive restarts.
pub trait VariableStore {
    fn load(&self, id: u32) -> Result<Option<i64>, Box<dyn std::error::Error + Send + Sync>>;
    fn save(
        &mut self,
        id: u32,
        value: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
