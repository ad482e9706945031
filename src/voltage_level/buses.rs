// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Calculated-bus derivation: grouping graph vertices into electrical buses
//! by traversing the switching graph through non-blocking edges, and caching
//! the result per topology view until the next invalidation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::Ordering;

use tracing::{trace, warn};

use crate::bus::CalculatedBus;
use crate::connectable::TerminalId;
use crate::graph::TraverseResult;
use crate::switch::Switch;
use crate::Error;

use super::{BusCache, TopologyContext, TopologyView, VoltageLevel};

impl TopologyView {
    /// The stop predicate of the view: traversal does not expand beyond an
    /// edge whose switch satisfies it.  Internal connections (edges without
    /// a switch) never stop a traversal.
    ///
    /// The bus/breaker view stops at retained switches even when they are
    /// closed: they stay visible as couplers between buses, while closed
    /// non-retained switches are absorbed into the bus.
    fn stops_at(self, switch: &Switch, scenario: usize) -> bool {
        match self {
            TopologyView::Bus => switch.is_open(scenario),
            TopologyView::BusBreaker => switch.is_open(scenario) || switch.is_retained(),
        }
    }
}

impl VoltageLevel {
    fn cache_cell(&self, view: TopologyView, scenario: usize) -> &RefCell<Option<BusCache>> {
        let state = self.state(scenario);
        match view {
            TopologyView::Bus => &state.bus_view,
            TopologyView::BusBreaker => &state.bus_breaker_view,
        }
    }

    /// Whether a candidate vertex-set forms a bus in the given view.
    fn is_bus_valid(
        &self,
        view: TopologyView,
        nodes: &[usize],
        terminals: &[TerminalId],
        ctx: &TopologyContext<'_>,
    ) -> bool {
        match view {
            TopologyView::Bus => {
                let mut busbar_section_count = 0;
                let mut branch_count = 0;
                let mut feeder_count = 0;
                for &terminal in terminals {
                    let kind = ctx.kind_of(terminal);
                    if kind.is_busbar_section() {
                        busbar_section_count += 1;
                    } else {
                        if kind.is_branch() {
                            branch_count += 1;
                        }
                        feeder_count += 1;
                    }
                }
                (busbar_section_count >= 1 && feeder_count >= 1)
                    || (branch_count >= 1 && feeder_count >= 2)
            }
            TopologyView::BusBreaker => nodes.len() > 1 || !terminals.is_empty(),
        }
    }

    /// Rebuilds the bus cache of the given view if it has been invalidated.
    /// A valid cache is returned untouched; the cache stays valid until
    /// explicitly invalidated.
    pub(crate) fn update_cache(&self, view: TopologyView, ctx: &TopologyContext<'_>) {
        let cell = self.cache_cell(view, ctx.scenario);
        if cell.borrow().is_some() {
            return;
        }
        trace!("Updating {view:?} topology of voltage level {}.", self.id);

        let vertex_count = self.graph.vertex_count();
        let mut visited = vec![false; vertex_count];
        let mut in_component = vec![false; vertex_count];
        let mut buses = Vec::new();
        let mut id_to_bus = HashMap::new();
        let mut node_to_bus: Vec<Option<usize>> = vec![None; vertex_count];

        for start in self.graph.vertices() {
            if visited[start] {
                continue;
            }
            let mut nodes = vec![start];
            in_component[start] = true;
            self.graph.traverse(
                start,
                |_, edge, other| {
                    if let Some(switch) = self.switch_at_edge(edge) {
                        if view.stops_at(switch, ctx.scenario) {
                            return TraverseResult::Terminate;
                        }
                    }
                    if !in_component[other] {
                        in_component[other] = true;
                        nodes.push(other);
                    }
                    TraverseResult::Continue
                },
                &mut visited,
            );

            let terminals: Vec<TerminalId> = nodes
                .iter()
                .filter_map(|&node| self.graph.vertex_object(node))
                .copied()
                .collect();

            if self.is_bus_valid(view, &nodes, &terminals, ctx) {
                let bus_id = format!(
                    "{}{}{}",
                    self.id,
                    ctx.config.bus_id_separator,
                    self.bus_counter.fetch_add(1, Ordering::Relaxed)
                );
                let bus = Rc::new(CalculatedBus::new(bus_id.clone(), self.index, terminals));
                id_to_bus.insert(bus_id, buses.len());
                for &node in &nodes {
                    node_to_bus[node] = Some(buses.len());
                }
                buses.push(bus);
            }
            for node in nodes {
                in_component[node] = false;
            }
        }

        trace!(
            "Found {} buses in voltage level {}.",
            buses.len(),
            self.id
        );
        *cell.borrow_mut() = Some(BusCache {
            buses,
            id_to_bus,
            node_to_bus,
        });
    }

    /// Returns the buses of the given view.
    pub(crate) fn buses(
        &self,
        view: TopologyView,
        ctx: &TopologyContext<'_>,
    ) -> Vec<Rc<CalculatedBus>> {
        self.update_cache(view, ctx);
        self.cache_cell(view, ctx.scenario)
            .borrow()
            .as_ref()
            .map(|cache| cache.buses().to_vec())
            .unwrap_or_default()
    }

    /// Returns the bus with the given id, if any.
    pub(crate) fn bus(
        &self,
        view: TopologyView,
        id: &str,
        ctx: &TopologyContext<'_>,
    ) -> Option<Rc<CalculatedBus>> {
        self.update_cache(view, ctx);
        self.cache_cell(view, ctx.scenario)
            .borrow()
            .as_ref()
            .and_then(|cache| cache.bus(id).cloned())
    }

    /// Returns the bus the given vertex maps to, if any.
    pub(crate) fn bus_at_node(
        &self,
        view: TopologyView,
        node: usize,
        ctx: &TopologyContext<'_>,
    ) -> Option<Rc<CalculatedBus>> {
        self.update_cache(view, ctx);
        self.cache_cell(view, ctx.scenario)
            .borrow()
            .as_ref()
            .and_then(|cache| cache.bus_at_node(node).cloned())
    }

    /// Returns the bus the given vertex could be connected to.
    ///
    /// If the vertex maps to no bus, the graph is traversed from it crossing
    /// open switches too, and the first bus found wins.  If the traversal
    /// finds none, the historical behavior falls back to an arbitrary bus of
    /// the cache (first in iteration order) — a documented quirk kept behind
    /// [`connectable_bus_fallback`][crate::TopologyConfig::connectable_bus_fallback].
    pub(crate) fn connectable_bus_at_node(
        &self,
        view: TopologyView,
        node: usize,
        ctx: &TopologyContext<'_>,
    ) -> Option<Rc<CalculatedBus>> {
        if let Some(bus) = self.bus_at_node(view, node, ctx) {
            return Some(bus);
        }
        let mut found = None;
        self.graph.traverse_from(node, |_, _, other| {
            match self.bus_at_node(view, other, ctx) {
                Some(bus) => {
                    found = Some(bus);
                    TraverseResult::Terminate
                }
                None => TraverseResult::Continue,
            }
        });
        if found.is_none() && ctx.config.connectable_bus_fallback {
            found = self.buses(view, ctx).first().cloned();
            if found.is_some() {
                warn!(
                    "No bus reachable from node {node} of voltage level {}; \
                     falling back to an arbitrary bus.",
                    self.id
                );
            }
        }
        found
    }

    /// Returns the bus on side 1 of a retained switch, in the bus/breaker
    /// view.  Asking for a non-retained switch is an error: it is not part
    /// of that view.
    pub(crate) fn bus_breaker_bus1(
        &self,
        switch_id: &str,
        ctx: &TopologyContext<'_>,
    ) -> Result<Option<Rc<CalculatedBus>>, Error> {
        let edge = self.retained_edge(switch_id)?;
        Ok(self.bus_at_node(TopologyView::BusBreaker, self.graph.edge_vertex1(edge), ctx))
    }

    /// Returns the bus on side 2 of a retained switch, in the bus/breaker
    /// view.
    pub(crate) fn bus_breaker_bus2(
        &self,
        switch_id: &str,
        ctx: &TopologyContext<'_>,
    ) -> Result<Option<Rc<CalculatedBus>>, Error> {
        let edge = self.retained_edge(switch_id)?;
        Ok(self.bus_at_node(TopologyView::BusBreaker, self.graph.edge_vertex2(edge), ctx))
    }

    fn retained_edge(&self, switch_id: &str) -> Result<usize, Error> {
        let edge = self.edge_of_switch(switch_id)?;
        let switch = self
            .switch_at_edge(edge)
            .unwrap_or_else(|| panic!("Edge {edge} holds no switch"));
        if !switch.is_retained() {
            return Err(Error::switch_not_found(format!(
                "Switch {switch_id} not found."
            )));
        }
        Ok(edge)
    }

    /// Returns the edge indices of the switches visible in the bus/breaker
    /// view, i.e. the retained ones.
    pub(crate) fn retained_switch_edges(&self) -> Vec<usize> {
        self.graph
            .edges()
            .filter(|&edge| self.switch_at_edge(edge).is_some_and(Switch::is_retained))
            .collect()
    }
}
