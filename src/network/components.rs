// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Network-wide connected components: labels every detailed-view bus with
//! the component it belongs to, where buses are adjacent when a line or a
//! transformer joins them.
//!
//! The computation is lazy: any topology change anywhere in the network
//! drops the cache, the next read rebuilds it.  Components are numbered by
//! decreasing size, so number 0 is always the main component.

use std::cell::Cell;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use petgraph::unionfind::UnionFind;
use tracing::debug;

use crate::bus::CalculatedBus;
use crate::connectable::TerminalId;
use crate::voltage_level::{TopologyContext, TopologyView};
use crate::Error;

use super::Network;

/// One connected component of the network.
///
/// Like calculated buses, components are ephemeral cache products: once the
/// component cache is invalidated every read on an old handle fails.
#[derive(Debug)]
pub struct ConnectedComponent {
    num: usize,
    size: usize,
    valid: Cell<bool>,
}

impl ConnectedComponent {
    fn new(num: usize, size: usize) -> Self {
        Self {
            num,
            size,
            valid: Cell::new(true),
        }
    }

    fn check_validity(&self) -> Result<(), Error> {
        if self.valid.get() {
            Ok(())
        } else {
            Err(Error::invalidated_state(format!(
                "Connected component {} has been invalidated.",
                self.num
            )))
        }
    }

    /// Returns the number of the component.  The main component is 0.
    pub fn num(&self) -> Result<usize, Error> {
        self.check_validity()?;
        Ok(self.num)
    }

    /// Returns the number of buses in the component.
    pub fn size(&self) -> Result<usize, Error> {
        self.check_validity()?;
        Ok(self.size)
    }

    /// Returns whether this is the main (largest) component.
    pub fn is_main(&self) -> Result<bool, Error> {
        self.check_validity()?;
        Ok(self.num == 0)
    }

    fn invalidate(&self) {
        self.valid.set(false);
    }
}

/// The cached components of one scenario.
pub(super) struct ComponentCache {
    components: Vec<Rc<ConnectedComponent>>,
}

impl Network {
    /// Rebuilds the component cache of the current scenario if it has been
    /// invalidated; a valid cache is returned untouched.
    fn update_components(&self) {
        let state = self.states.get(self.scenario_index);
        if state.components.borrow().is_some() {
            return;
        }
        debug!("Updating connected components of network {}.", self.id);
        let ctx = self.ctx();

        // old labels on simplified-view buses must not survive the rebuild
        for level in &self.voltage_levels {
            for bus in level.buses(TopologyView::BusBreaker, &ctx) {
                bus.set_component(None);
            }
        }

        let mut buses: Vec<Rc<CalculatedBus>> = Vec::new();
        let mut bus_index: HashMap<String, usize> = HashMap::new();
        for level in &self.voltage_levels {
            for bus in level.buses(TopologyView::Bus, &ctx) {
                bus_index.insert(bus.raw_id().to_string(), buses.len());
                buses.push(bus);
            }
        }

        let mut union: UnionFind<usize> = UnionFind::new(buses.len());
        for connectable in self.connectables.iter().flatten() {
            if !connectable.kind.joins_component_graph() {
                continue;
            }
            let ends: Vec<Option<usize>> = connectable
                .terminals
                .iter()
                .map(|&terminal| self.bus_index_of(terminal, &bus_index, &ctx))
                .collect();
            for (index, &end1) in ends.iter().enumerate() {
                for &end2 in &ends[index + 1..] {
                    if let (Some(end1), Some(end2)) = (end1, end2) {
                        union.union(end1, end2);
                    }
                }
            }
        }

        let labels = union.into_labeling();
        let mut sizes: HashMap<usize, usize> = HashMap::new();
        for &label in &labels {
            *sizes.entry(label).or_insert(0) += 1;
        }
        // number by decreasing size, first appearance breaking ties, so
        // number 0 is the main component
        let mut order: Vec<usize> = Vec::new();
        let mut seen = HashSet::new();
        for &label in &labels {
            if seen.insert(label) {
                order.push(label);
            }
        }
        order.sort_by_key(|label| Reverse(sizes[label]));
        let numbering: HashMap<usize, usize> = order
            .iter()
            .enumerate()
            .map(|(num, &label)| (label, num))
            .collect();

        for (index, bus) in buses.iter().enumerate() {
            bus.set_component(Some(numbering[&labels[index]]));
        }
        let components = order
            .iter()
            .enumerate()
            .map(|(num, label)| Rc::new(ConnectedComponent::new(num, sizes[label])))
            .collect::<Vec<_>>();
        debug!(
            "Found {} connected components over {} buses.",
            components.len(),
            buses.len()
        );
        *state.components.borrow_mut() = Some(ComponentCache { components });
    }

    /// The dense index of the detailed-view bus a branch terminal belongs
    /// to, if it is attached and in a bus.
    fn bus_index_of(
        &self,
        terminal: TerminalId,
        bus_index: &HashMap<String, usize>,
        ctx: &TopologyContext<'_>,
    ) -> Option<usize> {
        let record = &self.terminals[terminal.0];
        let level = record.voltage_level?;
        let node = record.node()?;
        let bus = self.voltage_levels[level.0].bus_at_node(TopologyView::Bus, node, ctx)?;
        bus_index.get(bus.raw_id()).copied()
    }

    /// Returns the connected components of the current scenario, ordered
    /// by decreasing size.
    pub fn connected_components(&self) -> Vec<Rc<ConnectedComponent>> {
        self.update_components();
        self.states
            .get(self.scenario_index)
            .components
            .borrow()
            .as_ref()
            .map(|cache| cache.components.clone())
            .unwrap_or_default()
    }

    /// Returns the component of a detailed-view bus, if it belongs to one.
    pub fn connected_component_of(
        &self,
        bus: &CalculatedBus,
    ) -> Result<Option<Rc<ConnectedComponent>>, Error> {
        self.update_components();
        let Some(num) = bus.connected_component_number()? else {
            return Ok(None);
        };
        Ok(self
            .states
            .get(self.scenario_index)
            .components
            .borrow()
            .as_ref()
            .and_then(|cache| cache.components.get(num).cloned()))
    }

    /// Returns whether a bus belongs to the main component.
    pub fn is_in_main_connected_component(&self, bus: &CalculatedBus) -> Result<bool, Error> {
        self.update_components();
        Ok(bus.connected_component_number()? == Some(0))
    }

    /// Drops the component cache of one scenario, invalidating every
    /// component record it produced.
    pub(super) fn invalidate_components(&self, scenario: usize) {
        if let Some(cache) = self.states.get(scenario).components.borrow_mut().take() {
            for component in &cache.components {
                component.invalidate();
            }
        }
    }

    pub(super) fn invalidate_components_all_scenarios(&self) {
        for scenario in 0..self.states.size() {
            self.invalidate_components(scenario);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::single_feeder;
    use super::*;
    use crate::connectable::{ConnectableKind, TerminalConnection};
    use crate::{Network, SwitchKind, VoltageLevelId};

    /// One busbar section plus one load per level, everything plain-wired,
    /// so each level derives exactly one bus.  Nodes 2 and 3 sit behind the
    /// retained breaker and are free for line terminals.
    fn single_bus_level(network: &mut Network, id: &str) -> VoltageLevelId {
        let level = network.add_voltage_level(id).unwrap();
        network.set_node_count(level, 4);
        single_feeder(
            network,
            level,
            &format!("{id}_BBS"),
            ConnectableKind::BusbarSection,
            0,
        );
        single_feeder(network, level, &format!("{id}_LD"), ConnectableKind::Load, 1);
        network.add_internal_connection(level, 0, 1).unwrap();
        network
            .add_switch(
                level,
                &format!("{id}_BR"),
                SwitchKind::Breaker,
                0,
                2,
                false,
                true,
            )
            .unwrap();
        network.add_internal_connection(level, 2, 3).unwrap();
        level
    }

    fn line(
        network: &mut Network,
        id: &str,
        end1: (VoltageLevelId, usize),
        end2: (VoltageLevelId, usize),
    ) {
        network
            .add_connectable(
                id,
                ConnectableKind::Line,
                &[
                    (end1.0, TerminalConnection::Node(end1.1)),
                    (end2.0, TerminalConnection::Node(end2.1)),
                ],
            )
            .unwrap();
    }

    /// Three single-bus levels chained by two lines, plus one isolated
    /// level: components {VL1, VL2, VL3} and {VL4}.
    fn chained_network() -> (Network, [VoltageLevelId; 4]) {
        let mut network = Network::new("N1");
        let levels = [
            single_bus_level(&mut network, "VL1"),
            single_bus_level(&mut network, "VL2"),
            single_bus_level(&mut network, "VL3"),
            single_bus_level(&mut network, "VL4"),
        ];
        line(&mut network, "L12", (levels[0], 2), (levels[1], 2));
        line(&mut network, "L23", (levels[1], 3), (levels[2], 2));
        (network, levels)
    }

    #[test]
    fn test_components_are_numbered_by_decreasing_size() {
        let (network, levels) = chained_network();
        let components = network.connected_components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].num(), Ok(0));
        assert_eq!(components[0].size(), Ok(3));
        assert_eq!(components[0].is_main(), Ok(true));
        assert_eq!(components[1].size(), Ok(1));
        assert_eq!(components[1].is_main(), Ok(false));

        let main_bus = network.bus_view(levels[0]).buses()[0].clone();
        assert!(network.is_in_main_connected_component(&main_bus).unwrap());
        let lone_bus = network.bus_view(levels[3]).buses()[0].clone();
        assert!(!network.is_in_main_connected_component(&lone_bus).unwrap());
        assert_eq!(
            network.connected_component_of(&lone_bus).unwrap().unwrap().num(),
            Ok(1)
        );
    }

    #[test]
    fn test_removing_a_line_splits_a_component() {
        let (mut network, levels) = chained_network();
        assert_eq!(network.connected_components().len(), 2);

        network.remove_connectable("L23").unwrap();
        let components = network.connected_components();
        assert_eq!(components.len(), 3);
        assert_eq!(components[0].size(), Ok(2));
        assert_eq!(components[1].size(), Ok(1));
        assert_eq!(components[2].size(), Ok(1));

        let split_bus = network.bus_view(levels[2]).buses()[0].clone();
        assert!(!network.is_in_main_connected_component(&split_bus).unwrap());
    }

    #[test]
    fn test_opening_a_line_breaker_splits_a_component() {
        let (mut network, levels) = chained_network();
        let main = network.connected_components()[0].clone();
        assert_eq!(main.size(), Ok(3));

        // VL3's line terminal loses its bus, so L23 joins nothing there
        network.set_switch_open(levels[2], "VL3_BR", true).unwrap();
        assert_eq!(
            main.num().unwrap_err(),
            Error::invalidated_state("Connected component 0 has been invalidated.")
        );
        let components = network.connected_components();
        assert_eq!(components[0].size(), Ok(2));
    }

    #[test]
    fn test_three_windings_transformer_joins_three_levels() {
        let mut network = Network::new("N1");
        let levels = [
            single_bus_level(&mut network, "VL1"),
            single_bus_level(&mut network, "VL2"),
            single_bus_level(&mut network, "VL3"),
        ];
        network
            .add_connectable(
                "TWT1",
                ConnectableKind::ThreeWindingsTransformer,
                &[
                    (levels[0], TerminalConnection::Node(2)),
                    (levels[1], TerminalConnection::Node(2)),
                    (levels[2], TerminalConnection::Node(2)),
                ],
            )
            .unwrap();
        let components = network.connected_components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].size(), Ok(3));
    }

    #[test]
    fn test_component_rebuild_is_idempotent() {
        let (network, _levels) = chained_network();
        let first = network.connected_components();
        let second = network.connected_components();
        assert_eq!(first.len(), second.len());
        // the same cache products are handed out while nothing changes
        assert!(Rc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn test_simplified_view_buses_carry_no_component_number() {
        let (network, levels) = chained_network();
        network.connected_components();
        let simplified = network.bus_breaker_view(levels[0]).buses();
        for bus in simplified {
            assert_eq!(bus.connected_component_number(), Ok(None));
        }
    }
}
