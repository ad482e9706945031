// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Equipment attached to the topology: connectables and their terminals.
//!
//! The engine does not model equipment attributes; a connectable is a plain
//! record with an id, a kind and the terminals through which it touches the
//! switching graph.

/// Refers to a voltage level inside a [`Network`][crate::Network].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoltageLevelId(pub(crate) usize);

/// Refers to a connectable inside a [`Network`][crate::Network].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectableId(pub(crate) usize);

/// Refers to a terminal inside a [`Network`][crate::Network].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TerminalId(pub(crate) usize);

/// The closed set of connectable kinds known to the topology engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectableKind {
    /// A physical conducting bar that feeders and branches attach to.
    BusbarSection,
    Load,
    Generator,
    ShuntCompensator,
    StaticVarCompensator,
    DanglingLine,
    HvdcConverterStation,
    Line,
    TwoWindingsTransformer,
    ThreeWindingsTransformer,
}

impl ConnectableKind {
    /// Returns the number of terminals a connectable of this kind has.
    pub fn terminal_count(&self) -> usize {
        match self {
            Self::BusbarSection
            | Self::Load
            | Self::Generator
            | Self::ShuntCompensator
            | Self::StaticVarCompensator
            | Self::DanglingLine
            | Self::HvdcConverterStation => 1,
            Self::Line | Self::TwoWindingsTransformer => 2,
            Self::ThreeWindingsTransformer => 3,
        }
    }

    /// Returns true for busbar sections.
    pub fn is_busbar_section(&self) -> bool {
        *self == Self::BusbarSection
    }

    /// Returns true for branch-type connectables, which count toward both the
    /// branch and the feeder tally of the detailed bus-validity rule.
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Self::Line | Self::TwoWindingsTransformer | Self::ThreeWindingsTransformer
        )
    }

    /// Returns true for the kinds whose endpoints join the network-wide
    /// connected-component graph.
    pub(crate) fn joins_component_graph(&self) -> bool {
        matches!(
            self,
            Self::Line | Self::TwoWindingsTransformer | Self::ThreeWindingsTransformer
        )
    }

    /// Returns true for equipment counting toward the feeder tally: anything
    /// that is not a busbar section.
    pub fn is_feeder(&self) -> bool {
        !self.is_busbar_section()
    }
}

/// How a terminal plugs into its voltage level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalConnection {
    /// Connection to a numbered vertex of a node/breaker level.
    Node(usize),
    /// Connection to a configured bus of a bus/breaker-native level.  This
    /// engine models node/breaker levels only and rejects such terminals at
    /// attach time.
    Bus(String),
}

/// One electrical connection point of a connectable.
#[derive(Debug)]
pub(crate) struct Terminal {
    pub(crate) connectable: ConnectableId,
    pub(crate) connection: TerminalConnection,
    /// Set while the terminal is attached to a voltage level.
    pub(crate) voltage_level: Option<VoltageLevelId>,
}

impl Terminal {
    /// Returns the graph vertex of this terminal, which only node-connected
    /// terminals have.
    pub(crate) fn node(&self) -> Option<usize> {
        match &self.connection {
            TerminalConnection::Node(node) => Some(*node),
            TerminalConnection::Bus(_) => None,
        }
    }
}

/// A piece of equipment and the terminals connecting it to the topology.
#[derive(Debug)]
pub(crate) struct Connectable {
    pub(crate) id: String,
    pub(crate) kind: ConnectableKind,
    pub(crate) terminals: Vec<TerminalId>,
}
