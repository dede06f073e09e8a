//! Paired valve drives and the round-robin selection of the next target.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};

/// Valve drives ordered by address, each with the sub-peer channels paired
/// through it. An entry without channels is kept but never selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairedDeviceRegistry {
    devices: BTreeMap<u32, BTreeSet<u8>>,
}

impl PairedDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `channel` under `address`. Returns true if the drive is new.
    pub fn pair(&mut self, address: u32, channel: u8) -> bool {
        let is_new = !self.devices.contains_key(&address);
        self.devices.entry(address).or_default().insert(channel);
        is_new
    }

    /// Remove `channel` from `address`; the drive entry itself stays.
    pub fn unpair(&mut self, address: u32, channel: u8) -> bool {
        self.devices
            .get_mut(&address)
            .is_some_and(|set| set.remove(&channel))
    }

    /// Register `address` without channels.
    pub fn insert(&mut self, address: u32) {
        self.devices.entry(address).or_default();
    }

    pub fn remove(&mut self, address: u32) -> bool {
        self.devices.remove(&address).is_some()
    }

    pub fn contains(&self, address: u32) -> bool {
        self.devices.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn first(&self) -> Option<u32> {
        self.devices.keys().next().copied()
    }

    pub fn has_sub_peers(&self, address: u32) -> bool {
        self.devices.get(&address).is_some_and(|s| !s.is_empty())
    }

    pub fn channels(&self, address: u32) -> Option<&BTreeSet<u8>> {
        self.devices.get(&address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.devices.keys().copied()
    }
}

/// Round-robin cursor over a [`PairedDeviceRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceRotation {
    cursor: Option<u32>,
}

impl DeviceRotation {
    pub fn new(cursor: Option<u32>) -> Self {
        Self { cursor }
    }

    pub fn cursor(&self) -> Option<u32> {
        self.cursor
    }

    /// Forget the cursor if it points at `address`.
    pub fn forget(&mut self, address: u32) {
        if self.cursor == Some(address) {
            self.cursor = None;
        }
    }

    /// Advance to the next drive with at least one sub-peer.
    ///
    /// Starts one entry past the cursor (or past the first entry when the
    /// cursor is unset or unknown) and wraps around; a lone drive selects
    /// itself. Returns `None` when no drive has sub-peers.
    pub fn next(&mut self, registry: &PairedDeviceRegistry) -> Option<u32> {
        let start = match self.cursor {
            Some(c) if registry.contains(c) => c,
            _ => registry.first()?,
        };
        let found = registry
            .devices
            .range((Excluded(start), Unbounded))
            .chain(registry.devices.iter())
            .take(registry.len() + 1)
            .find(|(_, channels)| !channels.is_empty())
            .map(|(address, _)| *address);
        match found {
            Some(address) => {
                self.cursor = Some(address);
                Some(address)
            }
            None => {
                tracing::debug!(drives = registry.len(), "no valve drive with sub-peers");
                None
            }
        }
    }
}
