// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

/*!
# Frequenz Grid Topology

This is a library for resolving the electrical topology of a power grid
modelled at the node/breaker level: voltage levels are undirected
multigraphs whose vertices hold equipment terminals and whose edges hold
switching devices, and the library derives the *electrical buses* — groups
of terminals connected through closed switches — and the network-wide
connected components from them.

## Building a network

The main struct is [`Network`].  Topology is built imperatively: add
voltage levels, grow their vertex count with
[`set_node_count`][Network::set_node_count], wire switches between
vertices with [`add_switch`][Network::add_switch], and attach equipment
with [`add_connectable`][Network::add_connectable].  Equipment attributes
are out of scope here: a connectable is an id, a
[kind][ConnectableKind] and its terminals.

## Topology views

Two views are calculated per voltage level, both lazily and cached until
the next mutation:

- The detailed [`BusView`]: traversal stops only at open switches, so a
  bus groups everything galvanically connected right now.
- The simplified [`BusBreakerView`]: traversal also stops at *retained*
  switches, which survive as visible couplers between buses, while
  closed non-retained switches are collapsed away.

Calculated buses are handed out as shared [`CalculatedBus`] handles.  Any
mutation invalidates the affected caches, and every read on a stale
handle fails with an [`Error`] instead of silently returning outdated
topology.

## Connectivity

[`connect`][Network::connect] and [`disconnect`][Network::disconnect]
operate a terminal by searching paths to a busbar section and toggling
breakers along them.  Network-wide,
[`connected_components`][Network::connected_components] labels every bus
with the component it belongs to, numbered by decreasing size so that
component 0 is the main one.

## Scenarios

All mutable switching state is scenario-indexed: the network carries an
array of parallel "what-if" states that can be extended, reduced and
reallocated through the `*_state_array_*` methods, with
[`set_scenario_index`][Network::set_scenario_index] selecting the one
that reads and writes go to.
*/

mod error;
pub use error::Error;

mod config;
pub use config::TopologyConfig;

mod graph;
pub use graph::{TraverseResult, UndirectedGraph};

mod state;

mod switch;
pub use switch::{Switch, SwitchKind};

mod connectable;
pub use connectable::{
    ConnectableId, ConnectableKind, TerminalConnection, TerminalId, VoltageLevelId,
};

mod bus;
pub use bus::CalculatedBus;

mod voltage_level;

mod listener;
pub use listener::NetworkListener;

mod network;
pub use network::{BusBreakerView, BusView, ConnectedComponent, Network};
