// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Switching devices: breakers, disconnectors and load-break switches.

use crate::state::{MultiScenarioObject, StateArray};

/// The kind of a switching device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchKind {
    /// A switch able to interrupt load current.
    Breaker,
    /// A switch only operated off-load, isolating a section of the topology.
    Disconnector,
    /// A switch able to interrupt load but not fault current.
    LoadBreakSwitch,
}

/// An on/off switching device sitting on one edge of a voltage level's graph.
///
/// The open/closed flag is scenario-indexed; the kind and the retained flag
/// are fixed at construction.
#[derive(Debug)]
pub struct Switch {
    id: String,
    kind: SwitchKind,
    retained: bool,
    open: StateArray<bool>,
}

impl Switch {
    pub(crate) fn new(
        id: impl Into<String>,
        kind: SwitchKind,
        open: bool,
        retained: bool,
        scenario_count: usize,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            retained,
            open: StateArray::new(scenario_count, || open),
        }
    }

    /// Returns the id of the switch.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the kind of the switch.
    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    /// Returns whether the switch is kept visible in the simplified
    /// (bus/breaker) view.
    pub fn is_retained(&self) -> bool {
        self.retained
    }

    /// Returns whether the switch is open in the given scenario.
    pub fn is_open(&self, scenario: usize) -> bool {
        *self.open.get(scenario)
    }

    /// Sets the open flag in the given scenario, returning whether the value
    /// changed.  Cache invalidation and change notification are the caller's
    /// job, since they reach beyond the switch itself.
    pub(crate) fn set_open(&mut self, scenario: usize, open: bool) -> bool {
        if *self.open.get(scenario) == open {
            return false;
        }
        *self.open.get_mut(scenario) = open;
        true
    }
}

impl MultiScenarioObject for Switch {
    fn extend_state_array_size(&mut self, _init_size: usize, count: usize, source_index: usize) {
        let source = *self.open.get(source_index);
        self.open.push(count, || source);
    }

    fn reduce_state_array_size(&mut self, count: usize) {
        self.open.pop(count);
    }

    fn delete_state_array_element(&mut self, index: usize) {
        self.open.delete(index);
    }

    fn allocate_state_array_element(&mut self, indices: &[usize], source_index: usize) {
        let source = *self.open.get(source_index);
        self.open.allocate(indices, || source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_is_scenario_indexed() {
        let mut switch = Switch::new("BR1", SwitchKind::Breaker, false, true, 1);
        assert!(!switch.is_open(0));
        assert!(switch.set_open(0, true));
        // setting the same value again reports no change
        assert!(!switch.set_open(0, true));

        switch.extend_state_array_size(1, 2, 0);
        assert!(switch.is_open(1));
        assert!(switch.is_open(2));
        assert!(switch.set_open(2, false));
        assert!(switch.is_open(0));
        assert!(!switch.is_open(2));

        switch.reduce_state_array_size(2);
        assert!(switch.is_open(0));
    }
}
