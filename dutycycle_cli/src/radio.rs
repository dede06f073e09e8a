//! Simulated radio: prints every packet to stdout instead of sending it.

use std::io::Write;

use dutycycle_traits::clock::{Clock, MonotonicClock};
use dutycycle_traits::{DutyCyclePacket, Transport};
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct ConsoleRadio {
    clock: MonotonicClock,
    json: bool,
}

impl ConsoleRadio {
    pub fn new(json: bool) -> Self {
        Self {
            clock: MonotonicClock::new(),
            json,
        }
    }
}

pub fn packet_line(p: &DutyCyclePacket, at_us: i64, json: bool) -> String {
    if json {
        return json!({
            "event": "packet",
            "at_us": at_us,
            "counter": p.message_counter,
            "control": p.control_byte,
            "type": p.message_type,
            "sender": format!("{:06X}", p.sender),
            "receiver": format!("{:06X}", p.receiver),
            "payload": p.payload,
        })
        .to_string();
    }
    let payload: Vec<String> = p.payload.iter().map(|b| format!("{b:02X}")).collect();
    format!(
        "{at_us} packet #{:03} {:02X} {:02X} {:06X} -> {:06X} [{}]",
        p.message_counter,
        p.control_byte,
        p.message_type,
        p.sender,
        p.receiver,
        payload.join(" ")
    )
}

impl Transport for ConsoleRadio {
    fn send(
        &self,
        packet: &DutyCyclePacket,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let line = packet_line(packet, self.clock.now_us(), self.json);
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}
