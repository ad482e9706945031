// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module contains the configuration options for the topology engine.

/// Configuration options for a [`Network`][crate::Network].
#[derive(Clone, Debug)]
pub struct TopologyConfig {
    /// The separator placed between a voltage level id and the bus counter
    /// when naming calculated buses.
    pub bus_id_separator: String,

    /// Whether [`connectable_bus`][crate::Network::connectable_bus_of] may
    /// fall back to an arbitrary bus of the voltage level when the traversal
    /// from the terminal's vertex reaches no bus at all.
    ///
    /// This reproduces the historical "always connectable to something"
    /// behavior.  It is a documented quirk, not a guarantee to build on.
    pub connectable_bus_fallback: bool,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            bus_id_separator: "_".to_string(),
            connectable_bus_fallback: true,
        }
    }
}
