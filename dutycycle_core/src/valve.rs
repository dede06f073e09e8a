//! Valve state bookkeeping and adjustment-command derivation.

use crate::decalc::DecalcificationFlags;

/// Command byte sent as the first payload byte of a duty-cycle packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdjustmentCommand {
    /// Keep the current position.
    Noop = 0,
    Off = 2,
    On = 3,
    /// Full travel maintenance run.
    Decalcify = 4,
}

impl AdjustmentCommand {
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Convert an opening in percent to the protocol's 0..=255 scale.
///
/// `percent * 256 / 100`, rounded half up, clamped.
pub fn percent_to_valve_byte(percent: i32) -> u8 {
    let raw = i64::from(percent) * 256;
    let scaled = if raw % 100 >= 50 { raw / 100 + 1 } else { raw / 100 };
    u8::try_from(scaled.clamp(0, 255)).unwrap_or(u8::MAX)
}

/// Current (acknowledged by a send) and pending valve positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValveStateEncoder {
    current: u8,
    pending: u8,
}

impl ValveStateEncoder {
    pub fn new(current: u8, pending: u8) -> Self {
        Self { current, pending }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn pending(&self) -> u8 {
        self.pending
    }

    /// Set the desired opening in percent; returns the new pending byte.
    pub fn set_pending(&mut self, percent: i32) -> u8 {
        self.pending = percent_to_valve_byte(percent);
        self.pending
    }

    /// Command for `target`. Consumes a pending decalcification flag.
    pub fn command(&self, target: u32, flags: &mut DecalcificationFlags) -> AdjustmentCommand {
        if flags.take(target) {
            AdjustmentCommand::Decalcify
        } else if self.pending == 0 {
            AdjustmentCommand::Off
        } else if self.pending == u8::MAX || self.pending != self.current {
            AdjustmentCommand::On
        } else {
            AdjustmentCommand::Noop
        }
    }

    /// Record that `sent` went out successfully.
    pub fn commit(&mut self, sent: u8) {
        self.current = sent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(100, 255)]
    #[case(50, 128)]
    #[case(33, 84)]
    #[case(1, 3)]
    #[case(-20, 0)]
    #[case(250, 255)]
    fn percent_scaling(#[case] percent: i32, #[case] expected: u8) {
        let mut v = ValveStateEncoder::default();
        assert_eq!(v.set_pending(percent), expected);
        assert_eq!(v.pending(), expected);
    }

    #[rstest]
    #[case(0, 0, AdjustmentCommand::Off)]
    #[case(0, 255, AdjustmentCommand::On)]
    #[case(255, 255, AdjustmentCommand::On)]
    #[case(40, 128, AdjustmentCommand::On)]
    #[case(128, 128, AdjustmentCommand::Noop)]
    #[case(128, 0, AdjustmentCommand::Off)]
    fn command_table(#[case] current: u8, #[case] pending: u8, #[case] expected: AdjustmentCommand) {
        let v = ValveStateEncoder::new(current, pending);
        let mut flags = DecalcificationFlags::default();
        assert_eq!(v.command(0x2B0001, &mut flags), expected);
    }

    #[test]
    fn decalcification_wins_once() {
        let v = ValveStateEncoder::new(128, 128);
        let mut flags = DecalcificationFlags::default();
        flags.set_all([0x2B0001, 0x2B0002]);
        assert_eq!(v.command(0x2B0001, &mut flags), AdjustmentCommand::Decalcify);
        assert_eq!(v.command(0x2B0001, &mut flags), AdjustmentCommand::Noop);
        // Other drive keeps its flag.
        assert!(flags.is_set(0x2B0002));
    }

    #[test]
    fn commit_updates_current_only() {
        let mut v = ValveStateEncoder::new(10, 10);
        v.set_pending(50);
        assert_eq!(v.current(), 10);
        v.commit(v.pending());
        assert_eq!(v.current(), 128);
        assert_eq!(AdjustmentCommand::Decalcify.as_byte(), 4);
    }
}
