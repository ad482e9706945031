// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Attaching, detaching, connecting and disconnecting terminals.
//!
//! Connect and disconnect search for paths from the terminal's vertex to a
//! busbar section that avoid open disconnectors, and toggle breakers along
//! those paths.

use crate::connectable::{TerminalConnection, TerminalId};
use crate::switch::SwitchKind;
use crate::Error;

use super::{TopologyContext, VoltageLevel};

impl VoltageLevel {
    /// Validates that `terminal` can be attached to its target vertex and,
    /// unless `test` is set, links the vertex to the terminal.  The
    /// terminal-side link is the network's job.
    pub(crate) fn attach(
        &mut self,
        terminal: TerminalId,
        ctx: &TopologyContext<'_>,
        test: bool,
    ) -> Result<(), Error> {
        let node = match &ctx.terminals[terminal.0].connection {
            TerminalConnection::Node(node) => *node,
            TerminalConnection::Bus(_) => {
                return Err(Error::validation(format!(
                    "Voltage level {} has a node/breaker topology, a node connection \
                     should be specified instead of a bus connection.",
                    self.id
                )));
            }
        };
        self.check_node(node)?;
        if let Some(&occupant) = self.graph.vertex_object(node) {
            return Err(Error::validation(format!(
                "An equipment ({}) is already connected to node {node} of voltage level {}.",
                ctx.connectable_id(occupant),
                self.id
            )));
        }
        if !test {
            self.graph.set_vertex_object(node, terminal);
        }
        Ok(())
    }

    /// Clears the vertex of a terminal and removes the edges belonging
    /// exclusively to its stub: edge removal propagates through empty
    /// vertices left with at most one other edge, and stops at vertices
    /// carrying another terminal or serving as junctions.
    ///
    /// Returns the ids of the switches freed along the way, so the caller
    /// can emit removal events.
    pub(crate) fn detach(&mut self, node: usize) -> Vec<String> {
        let mut freed_switches = Vec::new();
        self.graph.remove_vertex_object(node);

        let mut stack = vec![node];
        while let Some(v) = stack.pop() {
            for edge in self.graph.edges_connected_to_vertex(v) {
                let other = self.graph.edge_other_vertex(edge, v);
                if let Some(&switch) = self.graph.edge_object(edge) {
                    let id = self.switches[switch].id().to_string();
                    self.switch_index.remove(&id);
                    freed_switches.push(id);
                }
                self.graph.remove_edge(edge);
                if other != v
                    && self.graph.vertex_object(other).is_none()
                    && self.graph.edges_connected_to_vertex(other).len() == 1
                {
                    stack.push(other);
                }
            }
        }
        freed_switches
    }

    fn busbar_paths(&self, node: usize, ctx: &TopologyContext<'_>) -> Vec<Vec<usize>> {
        // paths to a busbar section avoiding open disconnectors, already
        // sorted shortest first
        self.graph.find_all_paths(
            node,
            |terminal| terminal.is_some_and(|&t| ctx.kind_of(t).is_busbar_section()),
            |switch| {
                switch.is_some_and(|&s| {
                    self.switches[s].kind() == SwitchKind::Disconnector
                        && self.switches[s].is_open(ctx.scenario)
                })
            },
        )
    }

    /// Closes every open breaker on the shortest path from the given vertex
    /// to a busbar section.  Returns the arena indices of the switches that
    /// were toggled; an empty list means nothing changed.
    pub(crate) fn connect(&mut self, node: usize, ctx: &TopologyContext<'_>) -> Vec<usize> {
        let paths = self.busbar_paths(node, ctx);
        let mut toggled = Vec::new();
        if let Some(shortest) = paths.first() {
            for &edge in shortest {
                let Some(&switch) = self.graph.edge_object(edge) else {
                    continue;
                };
                let switch_ref = &mut self.switches[switch];
                if switch_ref.kind() == SwitchKind::Breaker && switch_ref.is_open(ctx.scenario) {
                    switch_ref.set_open(ctx.scenario, false);
                    toggled.push(switch);
                }
            }
        }
        toggled
    }

    /// Opens one breaker on every path from the given vertex to a busbar
    /// section.
    ///
    /// Returns `None` when disconnection through breakers alone is
    /// impossible — no path exists, or some path carries no breaker — in
    /// which case nothing is toggled.  Otherwise returns the toggled switch
    /// arena indices.
    pub(crate) fn disconnect(
        &mut self,
        node: usize,
        ctx: &TopologyContext<'_>,
    ) -> Option<Vec<usize>> {
        let paths = self.busbar_paths(node, ctx);
        if paths.is_empty() {
            return None;
        }

        // find one openable breaker per path before toggling anything, so a
        // failed disconnect leaves the topology untouched
        let mut to_open = Vec::new();
        for path in &paths {
            let breaker = path.iter().copied().find(|&edge| {
                self.graph
                    .edge_object(edge)
                    .is_some_and(|&s| self.switches[s].kind() == SwitchKind::Breaker)
            })?;
            to_open.push(breaker);
        }

        let mut toggled = Vec::new();
        for edge in to_open {
            let &switch = self
                .graph
                .edge_object(edge)
                .unwrap_or_else(|| panic!("Edge {edge} holds no switch"));
            let switch_ref = &mut self.switches[switch];
            if !switch_ref.is_open(ctx.scenario) {
                switch_ref.set_open(ctx.scenario, true);
                toggled.push(switch);
            }
        }
        Some(toggled)
    }

    /// Returns whether at least one path to a busbar section exists that is
    /// not blocked by any open switch, disconnector and breaker alike.
    pub(crate) fn is_connected(&self, node: usize, ctx: &TopologyContext<'_>) -> bool {
        let paths = self.graph.find_all_paths(
            node,
            |terminal| terminal.is_some_and(|&t| ctx.kind_of(t).is_busbar_section()),
            |switch| switch.is_some_and(|&s| self.switches[s].is_open(ctx.scenario)),
        );
        !paths.is_empty()
    }
}
