// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Per-voltage-level topology state: the switching graph, the switch index
//! and the lazily-computed calculated-bus caches for both topology views.

mod buses;
mod connection;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicU32;

use crate::bus::CalculatedBus;
use crate::config::TopologyConfig;
use crate::connectable::{Connectable, ConnectableKind, Terminal, TerminalId};
use crate::graph::UndirectedGraph;
use crate::state::{MultiScenarioObject, StateArray};
use crate::switch::{Switch, SwitchKind};
use crate::{Error, VoltageLevelId};

/// The two topology views calculated from a node/breaker graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TopologyView {
    /// The fully-detailed view: traversal stops only at open switches.
    Bus,
    /// The simplified bus/breaker view: traversal stops at open and at
    /// retained switches, so retained switches stay visible as couplers
    /// between buses while closed non-retained ones are collapsed away.
    BusBreaker,
}

/// Borrowed network context needed by the per-level topology algorithms:
/// the terminal and connectable arenas, the engine configuration and the
/// scenario to operate on.
pub(crate) struct TopologyContext<'a> {
    pub(crate) terminals: &'a [Terminal],
    pub(crate) connectables: &'a [Option<Connectable>],
    pub(crate) config: &'a TopologyConfig,
    pub(crate) scenario: usize,
}

impl TopologyContext<'_> {
    pub(crate) fn kind_of(&self, terminal: TerminalId) -> ConnectableKind {
        let connectable = self.terminals[terminal.0].connectable;
        self.connectables[connectable.0]
            .as_ref()
            .unwrap_or_else(|| panic!("Connectable {} not found", connectable.0))
            .kind
    }

    pub(crate) fn connectable_id(&self, terminal: TerminalId) -> &str {
        let connectable = self.terminals[terminal.0].connectable;
        &self.connectables[connectable.0]
            .as_ref()
            .unwrap_or_else(|| panic!("Connectable {} not found", connectable.0))
            .id
    }
}

/// Cached data for the buses of one topology view in one scenario.
pub(crate) struct BusCache {
    buses: Vec<Rc<CalculatedBus>>,
    id_to_bus: HashMap<String, usize>,
    node_to_bus: Vec<Option<usize>>,
}

impl BusCache {
    pub(crate) fn buses(&self) -> &[Rc<CalculatedBus>] {
        &self.buses
    }

    pub(crate) fn bus(&self, id: &str) -> Option<&Rc<CalculatedBus>> {
        self.id_to_bus.get(id).map(|&i| &self.buses[i])
    }

    pub(crate) fn bus_at_node(&self, node: usize) -> Option<&Rc<CalculatedBus>> {
        self.node_to_bus
            .get(node)
            .and_then(|slot| slot.map(|i| &self.buses[i]))
    }
}

/// The per-scenario slots of a voltage level: one lazily-filled bus cache
/// per topology view.
pub(crate) struct VoltageLevelState {
    bus_view: RefCell<Option<BusCache>>,
    bus_breaker_view: RefCell<Option<BusCache>>,
}

impl VoltageLevelState {
    fn new() -> Self {
        Self {
            bus_view: RefCell::new(None),
            bus_breaker_view: RefCell::new(None),
        }
    }
}

/// A node/breaker voltage level: the owner of one switching graph.
pub(crate) struct VoltageLevel {
    pub(crate) id: String,
    pub(crate) index: VoltageLevelId,
    /// Vertices carry the attached terminal, edges the index of the switch
    /// in the arena below (`None` for internal connections).
    pub(crate) graph: UndirectedGraph<TerminalId, usize>,
    /// Switch arena.  Removed switches leave an orphan entry behind;
    /// iteration always goes through the graph edges, never the arena.
    pub(crate) switches: Vec<Switch>,
    pub(crate) switch_index: HashMap<String, usize>,
    states: StateArray<VoltageLevelState>,
    bus_counter: AtomicU32,
}

impl VoltageLevel {
    pub(crate) fn new(id: impl Into<String>, index: VoltageLevelId, scenario_count: usize) -> Self {
        Self {
            id: id.into(),
            index,
            graph: UndirectedGraph::new(),
            switches: Vec::new(),
            switch_index: HashMap::new(),
            states: StateArray::new(scenario_count, VoltageLevelState::new),
            bus_counter: AtomicU32::new(0),
        }
    }

    pub(crate) fn state(&self, scenario: usize) -> &VoltageLevelState {
        self.states.get(scenario)
    }

    /// Looks up the graph edge carrying the switch with the given id.
    pub(crate) fn edge_of_switch(&self, switch_id: &str) -> Result<usize, Error> {
        self.switch_index.get(switch_id).copied().ok_or_else(|| {
            Error::switch_not_found(format!("Switch {switch_id} not found."))
        })
    }

    pub(crate) fn switch_at_edge(&self, edge: usize) -> Option<&Switch> {
        self.graph.edge_object(edge).map(|&i| &self.switches[i])
    }

    /// Adds a switch on an edge between `node1` and `node2` and returns the
    /// edge index.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_switch(
        &mut self,
        id: &str,
        kind: SwitchKind,
        node1: usize,
        node2: usize,
        open: bool,
        retained: bool,
        scenario_count: usize,
    ) -> Result<usize, Error> {
        if self.switch_index.contains_key(id) {
            return Err(Error::validation(format!(
                "Switch {id} already exists in voltage level {}.",
                self.id
            )));
        }
        self.check_node(node1)?;
        self.check_node(node2)?;
        let switch = Switch::new(id, kind, open, retained, scenario_count);
        self.switches.push(switch);
        let edge = self.graph.add_edge(node1, node2, Some(self.switches.len() - 1));
        self.switch_index.insert(id.to_string(), edge);
        Ok(edge)
    }

    /// Removes the switch with the given id, returning the index of its
    /// orphaned arena entry.
    pub(crate) fn remove_switch(&mut self, id: &str) -> Result<usize, Error> {
        let edge = self.switch_index.remove(id).ok_or_else(|| {
            Error::switch_not_found(format!(
                "Switch {id} not found in voltage level {}.",
                self.id
            ))
        })?;
        let switch = self
            .graph
            .remove_edge(edge)
            .unwrap_or_else(|| panic!("Edge {edge} holds no switch"));
        Ok(switch)
    }

    /// Adds an always-closed internal connection between two vertices.
    pub(crate) fn add_internal_connection(
        &mut self,
        node1: usize,
        node2: usize,
    ) -> Result<usize, Error> {
        self.check_node(node1)?;
        self.check_node(node2)?;
        Ok(self.graph.add_edge(node1, node2, None))
    }

    fn check_node(&self, node: usize) -> Result<(), Error> {
        if node >= self.graph.vertex_count() {
            return Err(Error::validation(format!(
                "Node {node} not found in voltage level {}; grow it with set_node_count first.",
                self.id
            )));
        }
        Ok(())
    }

    /// Invalidates the bus caches of both views in one scenario.  Every bus
    /// produced by the dropped caches is invalidated first, so stale handles
    /// fail loudly.
    pub(crate) fn invalidate_cache(&self, scenario: usize) {
        let state = self.states.get(scenario);
        for cell in [&state.bus_view, &state.bus_breaker_view] {
            if let Some(cache) = cell.borrow_mut().take() {
                for bus in cache.buses() {
                    bus.invalidate();
                }
            }
        }
    }

    /// Invalidates the bus caches of every scenario, for structural edits
    /// that change the graph itself.
    pub(crate) fn invalidate_cache_all_scenarios(&self) {
        for scenario in 0..self.states.size() {
            self.invalidate_cache(scenario);
        }
    }
}

impl MultiScenarioObject for VoltageLevel {
    fn extend_state_array_size(&mut self, init_size: usize, count: usize, source_index: usize) {
        // a branched scenario starts with cold caches
        self.states.push(count, VoltageLevelState::new);
        for switch in &mut self.switches {
            switch.extend_state_array_size(init_size, count, source_index);
        }
    }

    fn reduce_state_array_size(&mut self, count: usize) {
        self.states.pop(count);
        for switch in &mut self.switches {
            switch.reduce_state_array_size(count);
        }
    }

    fn delete_state_array_element(&mut self, index: usize) {
        self.states.delete(index);
        for switch in &mut self.switches {
            switch.delete_state_array_element(index);
        }
    }

    fn allocate_state_array_element(&mut self, indices: &[usize], source_index: usize) {
        self.states.allocate(indices, VoltageLevelState::new);
        for switch in &mut self.switches {
            switch.allocate_state_array_element(indices, source_index);
        }
    }
}
