// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Read-only view facades over the calculated topology of one voltage
//! level: the detailed bus view and the simplified bus/breaker view.

use std::rc::Rc;

use crate::bus::CalculatedBus;
use crate::switch::Switch;
use crate::voltage_level::{TopologyView, VoltageLevel};
use crate::{Error, VoltageLevelId};

use super::Network;

impl Network {
    /// The detailed topology view of a voltage level.
    pub fn bus_view(&self, level: VoltageLevelId) -> BusView<'_> {
        BusView {
            network: self,
            level,
        }
    }

    /// The simplified bus/breaker topology view of a voltage level.
    pub fn bus_breaker_view(&self, level: VoltageLevelId) -> BusBreakerView<'_> {
        BusBreakerView {
            network: self,
            level,
        }
    }
}

/// The detailed view: buses derived by stopping only at open switches.
pub struct BusView<'a> {
    network: &'a Network,
    level: VoltageLevelId,
}

impl<'a> BusView<'a> {
    fn level(&self) -> &'a VoltageLevel {
        &self.network.voltage_levels[self.level.0]
    }

    /// Returns the buses of the view.
    pub fn buses(&self) -> Vec<Rc<CalculatedBus>> {
        self.level().buses(TopologyView::Bus, &self.network.ctx())
    }

    /// Returns the bus with the given id, if any.
    pub fn bus(&self, id: &str) -> Option<Rc<CalculatedBus>> {
        self.level().bus(TopologyView::Bus, id, &self.network.ctx())
    }

    /// Returns the bus a busbar section has been merged into.
    pub fn merged_bus(&self, busbar_id: &str) -> Result<Rc<CalculatedBus>, Error> {
        let connectable = self.network.connectable(busbar_id)?;
        let record = self.network.connectables[connectable.0]
            .as_ref()
            .unwrap_or_else(|| panic!("Connectable {busbar_id} not found"));
        if !record.kind.is_busbar_section() {
            return Err(Error::validation(format!(
                "Connectable {busbar_id} is not a busbar section."
            )));
        }
        let terminal = record.terminals[0];
        let terminal_record = &self.network.terminals[terminal.0];
        if terminal_record.voltage_level != Some(self.level) {
            return Err(Error::not_found(format!(
                "Busbar section {busbar_id} not found in voltage level {}.",
                self.level().id
            )));
        }
        let node = terminal_record
            .node()
            .unwrap_or_else(|| panic!("Attached terminal {} has no node", terminal.0));
        self.level()
            .bus_at_node(TopologyView::Bus, node, &self.network.ctx())
            .ok_or_else(|| {
                Error::bus_not_found(format!("Busbar section {busbar_id} is part of no bus."))
            })
    }
}

/// The simplified view: only retained switches stay visible, everything
/// else is collapsed into its bus.
pub struct BusBreakerView<'a> {
    network: &'a Network,
    level: VoltageLevelId,
}

impl<'a> BusBreakerView<'a> {
    fn level(&self) -> &'a VoltageLevel {
        &self.network.voltage_levels[self.level.0]
    }

    /// Returns the buses of the view.
    pub fn buses(&self) -> Vec<Rc<CalculatedBus>> {
        self.level()
            .buses(TopologyView::BusBreaker, &self.network.ctx())
    }

    /// Returns the bus with the given id, if any.
    pub fn bus(&self, id: &str) -> Option<Rc<CalculatedBus>> {
        self.level()
            .bus(TopologyView::BusBreaker, id, &self.network.ctx())
    }

    /// Returns the bus on side 1 of a retained switch.
    pub fn bus1(&self, switch_id: &str) -> Result<Option<Rc<CalculatedBus>>, Error> {
        self.level().bus_breaker_bus1(switch_id, &self.network.ctx())
    }

    /// Returns the bus on side 2 of a retained switch.
    pub fn bus2(&self, switch_id: &str) -> Result<Option<Rc<CalculatedBus>>, Error> {
        self.level().bus_breaker_bus2(switch_id, &self.network.ctx())
    }

    /// Returns the switches visible in this view, i.e. the retained ones.
    pub fn switches(&self) -> Vec<&'a Switch> {
        let level = self.level();
        level
            .retained_switch_edges()
            .into_iter()
            .map(|edge| {
                level
                    .switch_at_edge(edge)
                    .unwrap_or_else(|| panic!("Edge {edge} holds no switch"))
            })
            .collect()
    }

    /// Returns the number of switches visible in this view.
    pub fn switch_count(&self) -> usize {
        self.level().retained_switch_edges().len()
    }

    /// Returns a switch visible in this view.  A non-retained switch is
    /// reported as absent: it does not exist in this view.
    pub fn switch(&self, switch_id: &str) -> Result<&'a Switch, Error> {
        let level = self.level();
        let edge = level.edge_of_switch(switch_id)?;
        let switch = level
            .switch_at_edge(edge)
            .unwrap_or_else(|| panic!("Edge {edge} holds no switch"));
        if !switch.is_retained() {
            return Err(Error::switch_not_found(format!(
                "Switch {switch_id} not found."
            )));
        }
        Ok(switch)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::three_busbar_network;
    use super::*;

    #[test]
    fn test_bus_lookup_by_id() {
        let (network, level) = three_busbar_network();
        let view = network.bus_view(level);
        let bus = &view.buses()[0];
        let found = view.bus(bus.id().unwrap()).unwrap();
        assert_eq!(found.id(), bus.id());
        assert!(view.bus("VL1_99").is_none());
    }

    #[test]
    fn test_merged_bus_of_busbar_section() {
        let (network, level) = three_busbar_network();
        let bus = network.bus_view(level).merged_bus("BBS3").unwrap();
        let busbar_terminal = network.terminal_at(level, 2).unwrap();
        assert!(bus.terminals().unwrap().contains(&busbar_terminal));

        // BBS1 sits alone behind the open breaker and forms no bus
        assert_eq!(
            network.bus_view(level).merged_bus("BBS1").unwrap_err(),
            Error::bus_not_found("Busbar section BBS1 is part of no bus.")
        );
        assert_eq!(
            network.bus_view(level).merged_bus("LD1").unwrap_err(),
            Error::validation("Connectable LD1 is not a busbar section.")
        );
    }

    #[test]
    fn test_bus_breaker_view_hides_non_retained_switches() {
        let (network, level) = three_busbar_network();
        let view = network.bus_breaker_view(level);
        assert_eq!(view.switch_count(), 1);
        assert_eq!(view.switches()[0].id(), "BR1");
        assert!(view.switch("BR1").is_ok());
        assert_eq!(
            view.switch("DS1").unwrap_err(),
            Error::switch_not_found("Switch DS1 not found.")
        );
        assert_eq!(
            view.bus1("DS1").unwrap_err(),
            Error::switch_not_found("Switch DS1 not found.")
        );
    }

    #[test]
    fn test_bus_breaker_view_sides_of_a_retained_switch() {
        let (network, level) = three_busbar_network();
        let view = network.bus_breaker_view(level);

        // the closed disconnectors are collapsed away, the open breaker
        // splits: BBS1 on one side, everything else on the other
        assert_eq!(view.buses().len(), 2);
        let bus1 = view.bus1("BR1").unwrap().unwrap();
        let bus2 = view.bus2("BR1").unwrap().unwrap();
        assert_ne!(bus1.id().unwrap(), bus2.id().unwrap());
    }

    #[test]
    fn test_retained_splits_the_simplified_view_but_non_retained_does_not() {
        let mut network = crate::Network::new("N1");
        let level = network.add_voltage_level("VL1").unwrap();
        network.set_node_count(level, 4);
        for (id, node) in [("BBS1", 0), ("BBS2", 1), ("BBS3", 2)] {
            network
                .add_connectable(
                    id,
                    crate::ConnectableKind::BusbarSection,
                    &[(level, crate::TerminalConnection::Node(node))],
                )
                .unwrap();
        }
        network
            .add_connectable(
                "LD1",
                crate::ConnectableKind::Load,
                &[(level, crate::TerminalConnection::Node(3))],
            )
            .unwrap();
        // the breaker is not retained here, so once closed it is absorbed
        network
            .add_switch(level, "BR1", crate::SwitchKind::Breaker, 0, 1, true, false)
            .unwrap();
        network
            .add_switch(level, "DS1", crate::SwitchKind::Disconnector, 1, 2, false, false)
            .unwrap();
        network
            .add_switch(level, "DS2", crate::SwitchKind::Disconnector, 2, 3, false, false)
            .unwrap();

        assert_eq!(network.bus_breaker_view(level).buses().len(), 2);
        network.set_switch_open(level, "BR1", false).unwrap();
        assert_eq!(network.bus_breaker_view(level).buses().len(), 1);
    }

    #[test]
    fn test_detailed_view_never_finer_than_simplified() {
        let (mut network, level) = three_busbar_network();
        network.set_switch_open(level, "BR1", false).unwrap();
        // with no open switch left, splitting only happens in the
        // simplified view, at the retained breaker
        assert!(
            network.bus_view(level).buses().len() <= network.bus_breaker_view(level).buses().len()
        );
    }
}
