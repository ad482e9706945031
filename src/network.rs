// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The network: sole owner of the voltage-level, connectable and terminal
//! arenas, of the listener list and of the scenario dimension.
//!
//! All cross-references between entities are arena indices
//! ([`VoltageLevelId`], [`ConnectableId`], [`TerminalId`]), so the network
//! is the single entry point for every query and mutation.

mod components;
mod equipment;
mod views;

use std::cell::RefCell;
use std::collections::HashMap;

use crate::config::TopologyConfig;
use crate::connectable::{Connectable, Terminal, TerminalId};
use crate::listener::NetworkListener;
use crate::state::{MultiScenarioObject, StateArray};
use crate::switch::{Switch, SwitchKind};
use crate::voltage_level::{TopologyContext, VoltageLevel};
use crate::{ConnectableId, Error, VoltageLevelId};

pub use components::ConnectedComponent;
pub use views::{BusBreakerView, BusView};

use components::ComponentCache;

/// The per-scenario slots of the network: the connected-component cache.
struct NetworkState {
    components: RefCell<Option<ComponentCache>>,
}

impl NetworkState {
    fn new() -> Self {
        Self {
            components: RefCell::new(None),
        }
    }
}

/// A power network made of node/breaker voltage levels.
pub struct Network {
    id: String,
    config: TopologyConfig,
    voltage_levels: Vec<VoltageLevel>,
    voltage_level_index: HashMap<String, VoltageLevelId>,
    /// Connectable arena.  Removed connectables leave a `None` slot behind
    /// so the remaining ids stay stable.
    connectables: Vec<Option<Connectable>>,
    connectable_index: HashMap<String, ConnectableId>,
    terminals: Vec<Terminal>,
    listeners: Vec<Box<dyn NetworkListener>>,
    scenario_index: usize,
    states: StateArray<NetworkState>,
}

impl Network {
    /// Creates an empty network with the default configuration.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_config(id, TopologyConfig::default())
    }

    /// Creates an empty network with the given configuration.
    pub fn with_config(id: impl Into<String>, config: TopologyConfig) -> Self {
        Self {
            id: id.into(),
            config,
            voltage_levels: Vec::new(),
            voltage_level_index: HashMap::new(),
            connectables: Vec::new(),
            connectable_index: HashMap::new(),
            terminals: Vec::new(),
            listeners: Vec::new(),
            scenario_index: 0,
            states: StateArray::new(1, NetworkState::new),
        }
    }

    /// Returns the id of the network.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registers a listener notified of every subsequent change.
    pub fn add_listener(&mut self, listener: Box<dyn NetworkListener>) {
        self.listeners.push(listener);
    }

    fn notify_creation(&mut self, id: &str) {
        for listener in &mut self.listeners {
            listener.on_creation(id);
        }
    }

    fn notify_removal(&mut self, id: &str) {
        for listener in &mut self.listeners {
            listener.on_removal(id);
        }
    }

    fn notify_update(&mut self, id: &str, attribute: &str, old_value: &str, new_value: &str) {
        for listener in &mut self.listeners {
            listener.on_update(id, attribute, old_value, new_value);
        }
    }

    /// The borrowed context handed to the per-level topology algorithms.
    fn ctx(&self) -> TopologyContext<'_> {
        TopologyContext {
            terminals: &self.terminals,
            connectables: &self.connectables,
            config: &self.config,
            scenario: self.scenario_index,
        }
    }

    /// Runs `f` on one voltage level mutably while lending it the rest of
    /// the network immutably.
    fn with_level_mut<R>(
        &mut self,
        level: VoltageLevelId,
        f: impl FnOnce(&mut VoltageLevel, &TopologyContext<'_>) -> R,
    ) -> R {
        let ctx = TopologyContext {
            terminals: &self.terminals,
            connectables: &self.connectables,
            config: &self.config,
            scenario: self.scenario_index,
        };
        f(&mut self.voltage_levels[level.0], &ctx)
    }

    /// Adds an empty node/breaker voltage level.
    pub fn add_voltage_level(&mut self, id: &str) -> Result<VoltageLevelId, Error> {
        if self.voltage_level_index.contains_key(id) {
            return Err(Error::validation(format!(
                "Voltage level {id} already exists in network {}.",
                self.id
            )));
        }
        let index = VoltageLevelId(self.voltage_levels.len());
        self.voltage_levels
            .push(VoltageLevel::new(id, index, self.states.size()));
        self.voltage_level_index.insert(id.to_string(), index);
        Ok(index)
    }

    /// Looks up a voltage level by id.
    pub fn voltage_level(&self, id: &str) -> Result<VoltageLevelId, Error> {
        self.voltage_level_index.get(id).copied().ok_or_else(|| {
            Error::not_found(format!(
                "Voltage level {id} not found in network {}.",
                self.id
            ))
        })
    }

    /// Returns the id of a voltage level.
    pub fn voltage_level_id(&self, level: VoltageLevelId) -> &str {
        &self.voltage_levels[level.0].id
    }

    /// Grows the vertex count of a voltage level's graph.  Vertices are
    /// never removed, so shrinking is not supported.
    pub fn set_node_count(&mut self, level: VoltageLevelId, count: usize) {
        self.voltage_levels[level.0].graph.set_vertex_count(count);
    }

    /// Returns the vertex count of a voltage level's graph.
    pub fn node_count(&self, level: VoltageLevelId) -> usize {
        self.voltage_levels[level.0].graph.vertex_count()
    }

    /// Returns the terminal attached to a graph vertex, if any.
    pub fn terminal_at(&self, level: VoltageLevelId, node: usize) -> Option<TerminalId> {
        self.voltage_levels[level.0].graph.vertex_object(node).copied()
    }

    /// Adds a switch between two vertices of a voltage level.
    #[allow(clippy::too_many_arguments)]
    pub fn add_switch(
        &mut self,
        level: VoltageLevelId,
        id: &str,
        kind: SwitchKind,
        node1: usize,
        node2: usize,
        open: bool,
        retained: bool,
    ) -> Result<(), Error> {
        let scenario_count = self.states.size();
        let voltage_level = &mut self.voltage_levels[level.0];
        voltage_level.add_switch(id, kind, node1, node2, open, retained, scenario_count)?;
        voltage_level.invalidate_cache_all_scenarios();
        self.invalidate_components_all_scenarios();
        self.notify_creation(id);
        Ok(())
    }

    /// Removes a switch, its graph edge and its id mapping.
    pub fn remove_switch(&mut self, level: VoltageLevelId, id: &str) -> Result<(), Error> {
        let voltage_level = &mut self.voltage_levels[level.0];
        voltage_level.remove_switch(id)?;
        voltage_level.invalidate_cache_all_scenarios();
        self.invalidate_components_all_scenarios();
        self.notify_removal(id);
        Ok(())
    }

    /// Adds an always-closed internal connection between two vertices of a
    /// voltage level.
    pub fn add_internal_connection(
        &mut self,
        level: VoltageLevelId,
        node1: usize,
        node2: usize,
    ) -> Result<(), Error> {
        let voltage_level = &mut self.voltage_levels[level.0];
        voltage_level.add_internal_connection(node1, node2)?;
        voltage_level.invalidate_cache_all_scenarios();
        self.invalidate_components_all_scenarios();
        Ok(())
    }

    /// Returns the switch with the given id in a voltage level.
    pub fn switch(&self, level: VoltageLevelId, id: &str) -> Result<&Switch, Error> {
        let voltage_level = &self.voltage_levels[level.0];
        let edge = voltage_level.edge_of_switch(id)?;
        Ok(voltage_level
            .switch_at_edge(edge)
            .unwrap_or_else(|| panic!("Edge {edge} holds no switch")))
    }

    /// Returns all switches of a voltage level, internal connections
    /// excluded.
    pub fn switches(&self, level: VoltageLevelId) -> Vec<&Switch> {
        let voltage_level = &self.voltage_levels[level.0];
        voltage_level
            .graph
            .edges()
            .filter_map(|edge| voltage_level.switch_at_edge(edge))
            .collect()
    }

    /// Opens or closes a switch in the current scenario.
    ///
    /// Setting the value it already has is a no-op.  An actual toggle
    /// invalidates the level's bus caches and the component cache of the
    /// current scenario, and notifies the listeners.  Returns whether the
    /// value changed.
    pub fn set_switch_open(
        &mut self,
        level: VoltageLevelId,
        id: &str,
        open: bool,
    ) -> Result<bool, Error> {
        let scenario = self.scenario_index;
        let voltage_level = &mut self.voltage_levels[level.0];
        let edge = voltage_level.edge_of_switch(id)?;
        let &switch = voltage_level
            .graph
            .edge_object(edge)
            .unwrap_or_else(|| panic!("Edge {edge} holds no switch"));
        if !voltage_level.switches[switch].set_open(scenario, open) {
            return Ok(false);
        }
        voltage_level.invalidate_cache(scenario);
        self.invalidate_components(scenario);
        self.notify_update(id, "open", &(!open).to_string(), &open.to_string());
        Ok(true)
    }

    /// Returns the number of scenarios.
    pub fn state_array_size(&self) -> usize {
        self.states.size()
    }

    /// Returns the scenario subsequent operations work on.
    pub fn scenario_index(&self) -> usize {
        self.scenario_index
    }

    /// Selects the scenario subsequent operations work on.
    pub fn set_scenario_index(&mut self, index: usize) {
        assert!(
            index < self.states.size(),
            "Scenario index {index} not found"
        );
        self.scenario_index = index;
    }

    /// Appends `count` scenarios, each copying the mutable state of the
    /// scenario at `source_index`.  Caches start cold in the new scenarios.
    pub fn extend_state_array_size(&mut self, count: usize, source_index: usize) {
        let init_size = self.states.size();
        self.states.push(count, NetworkState::new);
        for level in &mut self.voltage_levels {
            level.extend_state_array_size(init_size, count, source_index);
        }
    }

    /// Drops the last `count` scenarios.
    pub fn reduce_state_array_size(&mut self, count: usize) {
        self.states.pop(count);
        for level in &mut self.voltage_levels {
            level.reduce_state_array_size(count);
        }
    }

    /// Frees one scenario slot for later reuse by [`Self::allocate_state_array_element`].
    /// Handles into the freed scenario's caches are invalidated.
    pub fn delete_state_array_element(&mut self, index: usize) {
        for level in &self.voltage_levels {
            level.invalidate_cache(index);
        }
        self.invalidate_components(index);
        self.states.delete(index);
        for level in &mut self.voltage_levels {
            level.delete_state_array_element(index);
        }
    }

    /// Re-initializes the given scenario slots from the scenario at
    /// `source_index`.
    pub fn allocate_state_array_element(&mut self, indices: &[usize], source_index: usize) {
        self.states.allocate(indices, NetworkState::new);
        for level in &mut self.voltage_levels {
            level.allocate_state_array_element(indices, source_index);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::connectable::{ConnectableKind, TerminalConnection};
    use crate::ConnectableId;

    /// Records every event it sees, for assertions on notification order.
    pub(crate) struct RecordingListener {
        pub(crate) events: Rc<RefCell<Vec<String>>>,
    }

    impl NetworkListener for RecordingListener {
        fn on_creation(&mut self, id: &str) {
            self.events.borrow_mut().push(format!("created {id}"));
        }

        fn on_removal(&mut self, id: &str) {
            self.events.borrow_mut().push(format!("removed {id}"));
        }

        fn on_update(&mut self, id: &str, attribute: &str, old_value: &str, new_value: &str) {
            self.events
                .borrow_mut()
                .push(format!("updated {id} {attribute} {old_value}->{new_value}"));
        }
    }

    pub(crate) fn single_feeder(
        network: &mut Network,
        level: VoltageLevelId,
        id: &str,
        kind: ConnectableKind,
        node: usize,
    ) -> ConnectableId {
        network
            .add_connectable(id, kind, &[(level, TerminalConnection::Node(node))])
            .unwrap_or_else(|err| panic!("Adding {id} failed: {err}"))
    }

    /// The three-busbar single-level fixture:
    ///
    /// ```text
    ///   BBS1(0) --BR1 open, retained-- BBS2(1) --DS1 closed-- BBS3(2)
    ///                                                           |
    ///                                                     DS2 closed
    ///                                                           |
    ///                                                        LD1(3)
    /// ```
    pub(crate) fn three_busbar_network() -> (Network, VoltageLevelId) {
        let mut network = Network::new("N1");
        let level = network.add_voltage_level("VL1").unwrap();
        network.set_node_count(level, 4);
        single_feeder(&mut network, level, "BBS1", ConnectableKind::BusbarSection, 0);
        single_feeder(&mut network, level, "BBS2", ConnectableKind::BusbarSection, 1);
        single_feeder(&mut network, level, "BBS3", ConnectableKind::BusbarSection, 2);
        single_feeder(&mut network, level, "LD1", ConnectableKind::Load, 3);
        network
            .add_switch(level, "BR1", SwitchKind::Breaker, 0, 1, true, true)
            .unwrap();
        network
            .add_switch(level, "DS1", SwitchKind::Disconnector, 1, 2, false, false)
            .unwrap();
        network
            .add_switch(level, "DS2", SwitchKind::Disconnector, 2, 3, false, false)
            .unwrap();
        (network, level)
    }

    fn bus_ids(buses: &[Rc<crate::CalculatedBus>]) -> Vec<String> {
        buses
            .iter()
            .map(|bus| bus.id().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_three_busbar_detailed_view() {
        let (network, level) = three_busbar_network();

        // the open breaker splits nodes {0} from {1, 2, 3}; a busbar with no
        // feeder is not a valid bus, so only the right-hand side produces one
        let buses = network.bus_view(level).buses();
        assert_eq!(buses.len(), 1);
        let terminals = buses[0].terminals().unwrap().to_vec();
        assert_eq!(terminals.len(), 3);
        assert!(terminals.contains(&network.terminal_at(level, 3).unwrap()));
    }

    #[test]
    fn test_hvdc_station_without_busbar_forms_no_bus() {
        let mut network = Network::new("N1");
        let level = network.add_voltage_level("VL1").unwrap();
        network.set_node_count(level, 2);
        single_feeder(
            &mut network,
            level,
            "HVDC1",
            ConnectableKind::HvdcConverterStation,
            0,
        );
        single_feeder(&mut network, level, "LD1", ConnectableKind::Load, 1);
        network.add_internal_connection(level, 0, 1).unwrap();

        // two feeders, but no busbar section and no branch: not a valid bus
        assert!(network.bus_view(level).buses().is_empty());
    }

    #[test]
    fn test_three_busbar_closing_breaker_merges() {
        let (mut network, level) = three_busbar_network();
        assert_eq!(network.bus_view(level).buses().len(), 1);

        assert!(network.set_switch_open(level, "BR1", false).unwrap());
        let buses = network.bus_view(level).buses();
        assert_eq!(buses.len(), 1);
        assert_eq!(buses[0].terminals().unwrap().len(), 4);
    }

    #[test]
    fn test_non_retained_disconnector_never_splits_detailed_view() {
        let (mut network, level) = three_busbar_network();
        network.set_switch_open(level, "BR1", false).unwrap();

        // one bus either way: closed disconnectors are invisible to the
        // detailed view whether retained or not
        assert_eq!(network.bus_view(level).buses().len(), 1);
        let simplified = network.bus_breaker_view(level).buses();
        // the retained breaker still splits the simplified view
        assert!(simplified.len() > network.bus_view(level).buses().len());
    }

    #[test]
    fn test_cache_rebuild_is_idempotent() {
        let (network, level) = three_busbar_network();
        let first = bus_ids(&network.bus_view(level).buses());
        let second = bus_ids(&network.bus_view(level).buses());
        assert_eq!(first, second);
    }

    #[test]
    fn test_toggle_invalidates_stale_bus_handles() {
        let (mut network, level) = three_busbar_network();
        let bus = network.bus_view(level).buses()[0].clone();
        assert!(bus.id().is_ok());

        network.set_switch_open(level, "DS1", true).unwrap();
        assert_eq!(
            bus.id().unwrap_err(),
            Error::invalidated_state(format!("Bus {} has been invalidated.", bus.raw_id()))
        );
    }

    #[test]
    fn test_setting_same_switch_state_is_a_noop() {
        let (mut network, level) = three_busbar_network();
        let bus = network.bus_view(level).buses()[0].clone();

        assert!(!network.set_switch_open(level, "BR1", true).unwrap());
        // no toggle, no invalidation
        assert!(bus.id().is_ok());
    }

    #[test]
    fn test_unknown_switch_is_reported() {
        let (mut network, level) = three_busbar_network();
        assert_eq!(
            network.set_switch_open(level, "BR99", true),
            Err(Error::switch_not_found("Switch BR99 not found."))
        );
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let (mut network, level) = three_busbar_network();
        assert_eq!(
            network.add_voltage_level("VL1"),
            Err(Error::validation(
                "Voltage level VL1 already exists in network N1."
            ))
        );
        assert_eq!(
            network.add_switch(level, "BR1", SwitchKind::Breaker, 0, 1, false, true),
            Err(Error::validation(
                "Switch BR1 already exists in voltage level VL1."
            ))
        );
    }

    #[test]
    fn test_switch_out_of_graph_bounds_is_rejected() {
        let (mut network, level) = three_busbar_network();
        assert_eq!(
            network.add_switch(level, "BR9", SwitchKind::Breaker, 0, 9, false, true),
            Err(Error::validation(
                "Node 9 not found in voltage level VL1; grow it with set_node_count first."
            ))
        );
    }

    #[test]
    fn test_remove_switch_notifies_and_invalidates() {
        let (mut network, level) = three_busbar_network();
        let events = Rc::new(RefCell::new(Vec::new()));
        network.add_listener(Box::new(RecordingListener {
            events: events.clone(),
        }));
        let bus = network.bus_view(level).buses()[0].clone();

        network.remove_switch(level, "DS2").unwrap();
        assert_eq!(events.borrow().as_slice(), ["removed DS2"]);
        assert!(bus.id().is_err());
        // the load lost its only path to a busbar section
        assert!(network.bus_view(level).buses().is_empty());
    }

    #[test]
    fn test_switch_toggle_events_carry_old_and_new_value() {
        let (mut network, level) = three_busbar_network();
        let events = Rc::new(RefCell::new(Vec::new()));
        network.add_listener(Box::new(RecordingListener {
            events: events.clone(),
        }));

        network.set_switch_open(level, "BR1", false).unwrap();
        network.set_switch_open(level, "BR1", false).unwrap();
        assert_eq!(events.borrow().as_slice(), ["updated BR1 open true->false"]);
    }

    #[test]
    fn test_scenario_extension_copies_switch_state() {
        let (mut network, level) = three_busbar_network();
        network.extend_state_array_size(2, 0);
        assert_eq!(network.state_array_size(), 3);

        network.set_scenario_index(1);
        assert!(network.switch(level, "BR1").unwrap().is_open(1));
        network.set_switch_open(level, "BR1", false).unwrap();

        // the toggle is confined to scenario 1
        network.set_scenario_index(0);
        assert!(network.switch(level, "BR1").unwrap().is_open(0));
        assert_eq!(network.bus_view(level).buses().len(), 1);
        network.set_scenario_index(1);
        assert_eq!(network.bus_view(level).buses()[0].terminals().unwrap().len(), 4);
    }

    #[test]
    fn test_scenario_allocate_resets_slot_from_source() {
        let (mut network, level) = three_busbar_network();
        network.extend_state_array_size(1, 0);
        network.set_scenario_index(1);
        network.set_switch_open(level, "BR1", false).unwrap();
        assert!(!network.switch(level, "BR1").unwrap().is_open(1));

        network.delete_state_array_element(1);
        network.allocate_state_array_element(&[1], 0);
        assert!(network.switch(level, "BR1").unwrap().is_open(1));
    }

    #[test]
    fn test_scenario_reduction_drops_trailing_slots() {
        let (mut network, _level) = three_busbar_network();
        network.extend_state_array_size(3, 0);
        network.reduce_state_array_size(2);
        assert_eq!(network.state_array_size(), 2);
    }
}
