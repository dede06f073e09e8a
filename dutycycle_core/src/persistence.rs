//! Peer variables that survive a restart, and their mapping onto a
//! [`VariableStore`].

use dutycycle_config::MAX_ADDRESS;
use dutycycle_traits::VariableStore;

use crate::config::VariableIds;
use crate::error::{DutyCycleError, map_store_error};
use crate::valve::ValveStateEncoder;

/// Persisted peer variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    RotationCursor,
    ValveState,
    NewValveState,
    LastDutyCycleEvent,
    MessageCounter,
}

impl Variable {
    pub const ALL: [Variable; 5] = [
        Variable::RotationCursor,
        Variable::ValveState,
        Variable::NewValveState,
        Variable::LastDutyCycleEvent,
        Variable::MessageCounter,
    ];
}

impl VariableIds {
    pub fn id(&self, var: Variable) -> u32 {
        match var {
            Variable::RotationCursor => self.rotation_cursor,
            Variable::ValveState => self.valve_state,
            Variable::NewValveState => self.new_valve_state,
            Variable::LastDutyCycleEvent => self.last_duty_cycle_event,
            Variable::MessageCounter => self.message_counter,
        }
    }
}

/// In-memory copy of everything a peer persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedVariables {
    pub rotation_cursor: Option<u32>,
    pub valve: ValveStateEncoder,
    /// Negative when no duty-cycle event happened yet.
    pub last_duty_cycle_event: i64,
    pub message_counter: u8,
}

impl Default for PersistedVariables {
    fn default() -> Self {
        Self {
            rotation_cursor: None,
            valve: ValveStateEncoder::default(),
            last_duty_cycle_event: -1,
            message_counter: 0,
        }
    }
}

impl PersistedVariables {
    pub fn value(&self, var: Variable) -> i64 {
        match var {
            Variable::RotationCursor => self.rotation_cursor.map_or(-1, i64::from),
            Variable::ValveState => i64::from(self.valve.current()),
            Variable::NewValveState => i64::from(self.valve.pending()),
            Variable::LastDutyCycleEvent => self.last_duty_cycle_event,
            Variable::MessageCounter => i64::from(self.message_counter),
        }
    }
}

fn to_u8(var: Variable, v: i64) -> Option<u8> {
    let r = u8::try_from(v).ok();
    if r.is_none() {
        tracing::warn!(?var, value = v, "stored value out of range, using default");
    }
    r
}

/// Store handle plus the id mapping.
pub struct VariableStorage {
    store: Box<dyn VariableStore + Send>,
    ids: VariableIds,
}

impl std::fmt::Debug for VariableStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStorage")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl VariableStorage {
    pub fn new(store: Box<dyn VariableStore + Send>, ids: VariableIds) -> Self {
        Self { store, ids }
    }

    pub fn ids(&self) -> &VariableIds {
        &self.ids
    }

    fn load_raw(&self, var: Variable) -> Option<i64> {
        let id = self.ids.id(var);
        match self.store.load(id) {
            Ok(v) => v,
            Err(e) => {
                let err = map_store_error(e.as_ref());
                tracing::warn!(id, ?var, %err, "failed to load variable");
                None
            }
        }
    }

    /// Read every variable once. Missing or unreadable ones keep defaults.
    pub fn load_all(&self) -> PersistedVariables {
        let mut vars = PersistedVariables::default();
        if let Some(v) = self.load_raw(Variable::RotationCursor) {
            vars.rotation_cursor = u32::try_from(v)
                .ok()
                .filter(|a| *a <= MAX_ADDRESS);
        }
        let current = self
            .load_raw(Variable::ValveState)
            .and_then(|v| to_u8(Variable::ValveState, v))
            .unwrap_or(0);
        let pending = self
            .load_raw(Variable::NewValveState)
            .and_then(|v| to_u8(Variable::NewValveState, v))
            .unwrap_or(0);
        vars.valve = ValveStateEncoder::new(current, pending);
        if let Some(v) = self.load_raw(Variable::LastDutyCycleEvent) {
            vars.last_duty_cycle_event = v;
        }
        if let Some(c) = self
            .load_raw(Variable::MessageCounter)
            .and_then(|v| to_u8(Variable::MessageCounter, v))
        {
            vars.message_counter = c;
        }
        tracing::debug!(?vars, "loaded peer variables");
        vars
    }

    pub fn save(&mut self, var: Variable, value: i64) -> Result<(), DutyCycleError> {
        let id = self.ids.id(var);
        self.store
            .save(id, value)
            .map_err(|e| map_store_error(e.as_ref()))
    }

    /// Save and log on failure; the in-memory value stays authoritative.
    pub fn save_logged(&mut self, var: Variable, value: i64) {
        if let Err(e) = self.save(var, value) {
            tracing::warn!(?var, value, error = %e, "failed to persist variable");
        }
    }

    /// Write all variables; every one is attempted, the first error returned.
    pub fn save_all(&mut self, vars: &PersistedVariables) -> Result<(), DutyCycleError> {
        let mut first = None;
        for var in Variable::ALL {
            if let Err(e) = self.save(var, vars.value(var)) {
                tracing::warn!(?var, error = %e, "failed to persist variable");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}
