//! Weekly decalcification: one-shot flags per valve drive, set inside a
//! local-time window and consumed by the next command for that drive.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::config::DecalcificationCfg;

#[derive(Debug, Clone, Default)]
pub struct DecalcificationFlags {
    flags: HashMap<u32, bool>,
}

impl DecalcificationFlags {
    /// Raise the flag for every given address.
    pub fn set_all(&mut self, addresses: impl IntoIterator<Item = u32>) {
        for a in addresses {
            self.flags.insert(a, true);
        }
    }

    pub fn is_set(&self, address: u32) -> bool {
        self.flags.get(&address).copied().unwrap_or(false)
    }

    /// Read and clear the flag for `address`.
    pub fn take(&mut self, address: u32) -> bool {
        self.flags
            .get_mut(&address)
            .map(std::mem::take)
            .unwrap_or(false)
    }

    pub fn clear(&mut self, address: u32) {
        self.flags.insert(address, false);
    }

    pub fn remove(&mut self, address: u32) {
        self.flags.remove(&address);
    }
}

#[derive(Debug, Clone)]
pub struct DecalcificationScheduler {
    window: DecalcificationCfg,
}

impl DecalcificationScheduler {
    pub fn new(window: DecalcificationCfg) -> Self {
        Self { window }
    }

    /// Whether `t` (local time) falls inside the weekly window.
    pub fn in_window(&self, t: &NaiveDateTime) -> bool {
        let w = &self.window;
        w.enabled
            && t.weekday() == w.weekday
            && t.hour() == w.hour
            && (w.start_minute..=w.end_minute).contains(&t.minute())
    }

    /// Flag all `addresses` when `local` is inside the window.
    ///
    /// Returns how many flags were raised.
    pub fn check(
        &self,
        local: Option<NaiveDateTime>,
        addresses: impl IntoIterator<Item = u32>,
        flags: &mut DecalcificationFlags,
    ) -> usize {
        let Some(t) = local else {
            tracing::warn!("local time unavailable, skipping decalcification check");
            return 0;
        };
        if !self.in_window(&t) {
            return 0;
        }
        let before = flags.flags.values().filter(|v| **v).count();
        flags.set_all(addresses);
        let raised = flags.flags.values().filter(|v| **v).count() - before;
        if raised > 0 {
            tracing::info!(raised, "decalcification scheduled");
        }
        raised
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .expect("valid timestamp")
    }

    // 2024-06-01 was a Saturday.
    #[rstest]
    #[case(at(2024, 6, 1, 14, 0, 0), true)]
    #[case(at(2024, 6, 1, 14, 3, 59), true)]
    #[case(at(2024, 6, 1, 14, 4, 0), false)]
    #[case(at(2024, 6, 1, 13, 59, 59), false)]
    #[case(at(2024, 6, 2, 14, 1, 0), false)]
    #[case(at(2024, 6, 8, 14, 2, 30), true)]
    fn weekly_window(#[case] t: NaiveDateTime, #[case] expected: bool) {
        let s = DecalcificationScheduler::new(DecalcificationCfg::default());
        assert_eq!(s.in_window(&t), expected);
    }

    #[test]
    fn disabled_window_never_fires() {
        let s = DecalcificationScheduler::new(DecalcificationCfg {
            enabled: false,
            ..DecalcificationCfg::default()
        });
        assert!(!s.in_window(&at(2024, 6, 1, 14, 0, 0)));
    }

    #[test]
    fn check_flags_every_address_once() {
        let s = DecalcificationScheduler::new(DecalcificationCfg::default());
        let mut flags = DecalcificationFlags::default();
        let t = Some(at(2024, 6, 1, 14, 1, 0));
        assert_eq!(s.check(t, [1, 2, 3], &mut flags), 3);
        // Still inside the window on the next cycle: nothing new.
        assert_eq!(s.check(t, [1, 2, 3], &mut flags), 0);
        assert!(flags.take(2));
        assert!(!flags.take(2));
        assert!(flags.is_set(1) && flags.is_set(3));
        assert_eq!(s.check(None, [1], &mut flags), 0);
    }
}
