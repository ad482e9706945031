// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Equipment lifecycle and terminal-level connectivity operations.

use std::rc::Rc;

use crate::bus::CalculatedBus;
use crate::connectable::{Connectable, ConnectableKind, Terminal, TerminalConnection, TerminalId};
use crate::voltage_level::TopologyView;
use crate::{ConnectableId, Error, VoltageLevelId};

use super::Network;

impl Network {
    /// Adds a connectable and attaches its terminals.
    ///
    /// One `(voltage level, connection)` pair per terminal of the kind must
    /// be given.  The operation is atomic: every attachment is dry-run
    /// first, so a rejected terminal leaves the network unchanged.
    pub fn add_connectable(
        &mut self,
        id: &str,
        kind: ConnectableKind,
        connections: &[(VoltageLevelId, TerminalConnection)],
    ) -> Result<ConnectableId, Error> {
        if self.connectable_index.contains_key(id) {
            return Err(Error::validation(format!(
                "Connectable {id} already exists in network {}.",
                self.id
            )));
        }
        if connections.len() != kind.terminal_count() {
            return Err(Error::validation(format!(
                "A {kind:?} has {} terminals but {} connections were given.",
                kind.terminal_count(),
                connections.len()
            )));
        }
        for (index, (level, connection)) in connections.iter().enumerate() {
            let duplicate = connections[..index]
                .iter()
                .any(|(other_level, other)| other_level == level && other == connection);
            if duplicate {
                return Err(Error::validation(format!(
                    "Connectable {id} uses the same connection point twice."
                )));
            }
        }

        let connectable_id = ConnectableId(self.connectables.len());
        let first_terminal = self.terminals.len();
        for (_, connection) in connections {
            self.terminals.push(Terminal {
                connectable: connectable_id,
                connection: connection.clone(),
                voltage_level: None,
            });
        }
        let terminal_ids: Vec<TerminalId> =
            (first_terminal..self.terminals.len()).map(TerminalId).collect();
        self.connectables.push(Some(Connectable {
            id: id.to_string(),
            kind,
            terminals: terminal_ids.clone(),
        }));

        let dry_run: Result<(), Error> = connections.iter().zip(&terminal_ids).try_for_each(
            |(&(level, _), &terminal)| {
                self.with_level_mut(level, |voltage_level, ctx| {
                    voltage_level.attach(terminal, ctx, true)
                })
            },
        );
        if let Err(err) = dry_run {
            self.connectables.pop();
            self.terminals.truncate(first_terminal);
            return Err(err);
        }

        for (&(level, _), &terminal) in connections.iter().zip(&terminal_ids) {
            self.with_level_mut(level, |voltage_level, ctx| {
                voltage_level.attach(terminal, ctx, false)
            })
            .unwrap_or_else(|err| panic!("Attach of {id} failed after a clean dry run: {err}"));
            self.terminals[terminal.0].voltage_level = Some(level);
            self.voltage_levels[level.0].invalidate_cache_all_scenarios();
        }
        self.invalidate_components_all_scenarios();
        self.connectable_index.insert(id.to_string(), connectable_id);
        self.notify_creation(id);
        Ok(connectable_id)
    }

    /// Removes a connectable, detaching its terminals and removing the
    /// stub switches that connected nothing else.  Emits one removal event
    /// per freed switch, then one for the connectable itself.
    pub fn remove_connectable(&mut self, id: &str) -> Result<(), Error> {
        let connectable_id = self.connectable(id)?;
        let connectable = self.connectables[connectable_id.0]
            .take()
            .unwrap_or_else(|| panic!("Connectable {id} not found"));

        let mut freed_switches = Vec::new();
        for &terminal in &connectable.terminals {
            let Some(level) = self.terminals[terminal.0].voltage_level else {
                continue;
            };
            let node = self.terminals[terminal.0]
                .node()
                .unwrap_or_else(|| panic!("Attached terminal {} has no node", terminal.0));
            freed_switches.extend(self.voltage_levels[level.0].detach(node));
            self.terminals[terminal.0].voltage_level = None;
            self.voltage_levels[level.0].invalidate_cache_all_scenarios();
        }
        self.invalidate_components_all_scenarios();
        self.connectable_index.remove(id);
        for switch_id in &freed_switches {
            self.notify_removal(switch_id);
        }
        self.notify_removal(id);
        Ok(())
    }

    /// Looks up a connectable by id.
    pub fn connectable(&self, id: &str) -> Result<ConnectableId, Error> {
        self.connectable_index.get(id).copied().ok_or_else(|| {
            Error::not_found(format!(
                "Connectable {id} not found in network {}.",
                self.id
            ))
        })
    }

    /// Returns the id of a connectable.
    pub fn connectable_id(&self, connectable: ConnectableId) -> &str {
        &self.connectables[connectable.0]
            .as_ref()
            .unwrap_or_else(|| panic!("Connectable {} not found", connectable.0))
            .id
    }

    /// Returns the terminals of a connectable, in side order.
    pub fn terminals(&self, connectable: ConnectableId) -> &[TerminalId] {
        &self.connectables[connectable.0]
            .as_ref()
            .unwrap_or_else(|| panic!("Connectable {} not found", connectable.0))
            .terminals
    }

    fn attached_node(&self, terminal: TerminalId) -> Result<(VoltageLevelId, usize), Error> {
        let record = &self.terminals[terminal.0];
        let level = record.voltage_level.ok_or_else(|| {
            let owner = self.connectables[record.connectable.0]
                .as_ref()
                .map_or("a removed connectable", |connectable| &connectable.id);
            Error::validation(format!(
                "Terminal {} of {owner} is not attached to a voltage level.",
                terminal.0
            ))
        })?;
        let node = record
            .node()
            .unwrap_or_else(|| panic!("Attached terminal {} has no node", terminal.0));
        Ok((level, node))
    }

    /// Closes every open breaker on the shortest path from the terminal to
    /// a busbar section, avoiding open disconnectors.  Returns whether any
    /// switch was actually toggled.
    pub fn connect(&mut self, terminal: TerminalId) -> Result<bool, Error> {
        let (level, node) = self.attached_node(terminal)?;
        let toggled =
            self.with_level_mut(level, |voltage_level, ctx| voltage_level.connect(node, ctx));
        self.apply_toggles(level, &toggled, false);
        Ok(!toggled.is_empty())
    }

    /// Opens one breaker on every path from the terminal to a busbar
    /// section.  Returns `false`, without toggling anything, when no path
    /// exists or some path cannot be cut by a breaker.
    pub fn disconnect(&mut self, terminal: TerminalId) -> Result<bool, Error> {
        let (level, node) = self.attached_node(terminal)?;
        let Some(toggled) =
            self.with_level_mut(level, |voltage_level, ctx| voltage_level.disconnect(node, ctx))
        else {
            return Ok(false);
        };
        self.apply_toggles(level, &toggled, true);
        Ok(true)
    }

    fn apply_toggles(&mut self, level: VoltageLevelId, toggled: &[usize], open: bool) {
        if toggled.is_empty() {
            return;
        }
        let scenario = self.scenario_index;
        self.voltage_levels[level.0].invalidate_cache(scenario);
        self.invalidate_components(scenario);
        let ids: Vec<String> = toggled
            .iter()
            .map(|&switch| self.voltage_levels[level.0].switches[switch].id().to_string())
            .collect();
        for id in &ids {
            self.notify_update(id, "open", &(!open).to_string(), &open.to_string());
        }
    }

    /// Returns whether at least one all-closed path from the terminal to a
    /// busbar section exists.
    pub fn is_connected(&self, terminal: TerminalId) -> Result<bool, Error> {
        let (level, node) = self.attached_node(terminal)?;
        let ctx = self.ctx();
        Ok(self.voltage_levels[level.0].is_connected(node, &ctx))
    }

    /// Returns the detailed-view bus the terminal belongs to, if any.
    pub fn bus_of(&self, terminal: TerminalId) -> Option<Rc<CalculatedBus>> {
        self.terminal_bus(terminal, TopologyView::Bus)
    }

    /// Returns the bus/breaker-view bus the terminal belongs to, if any.
    pub fn bus_breaker_bus_of(&self, terminal: TerminalId) -> Option<Rc<CalculatedBus>> {
        self.terminal_bus(terminal, TopologyView::BusBreaker)
    }

    /// Returns the detailed-view bus the terminal could be connected to,
    /// crossing open switches if it belongs to none.
    pub fn connectable_bus_of(&self, terminal: TerminalId) -> Option<Rc<CalculatedBus>> {
        let record = &self.terminals[terminal.0];
        let level = record.voltage_level?;
        let node = record.node()?;
        let ctx = self.ctx();
        self.voltage_levels[level.0].connectable_bus_at_node(TopologyView::Bus, node, &ctx)
    }

    fn terminal_bus(&self, terminal: TerminalId, view: TopologyView) -> Option<Rc<CalculatedBus>> {
        let record = &self.terminals[terminal.0];
        let level = record.voltage_level?;
        let node = record.node()?;
        let ctx = self.ctx();
        self.voltage_levels[level.0].bus_at_node(view, node, &ctx)
    }
}
