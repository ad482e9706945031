// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Calculated buses: derived electrical nodes grouping directly-connected
//! terminals.
//!
//! Buses are ephemeral cache products.  They are shared by reference (via
//! `Rc`) among their member terminals and the connected-component manager,
//! and are invalidated in lock-step with the topology cache that produced
//! them: any read on an invalidated bus fails loudly instead of silently
//! returning stale data.

use std::cell::Cell;

use crate::{connectable::TerminalId, Error, VoltageLevelId};

/// A derived electrical bus of one topology view of a voltage level.
///
/// The bus stays usable until the owning voltage level's cache is
/// invalidated; after that every accessor returns an `InvalidatedState`
/// error.
#[derive(Debug)]
pub struct CalculatedBus {
    id: String,
    voltage_level: VoltageLevelId,
    terminals: Vec<TerminalId>,
    valid: Cell<bool>,
    component: Cell<Option<usize>>,
}

impl CalculatedBus {
    pub(crate) fn new(
        id: String,
        voltage_level: VoltageLevelId,
        terminals: Vec<TerminalId>,
    ) -> Self {
        Self {
            id,
            voltage_level,
            terminals,
            valid: Cell::new(true),
            component: Cell::new(None),
        }
    }

    fn check_validity(&self) -> Result<(), Error> {
        if self.valid.get() {
            Ok(())
        } else {
            Err(Error::invalidated_state(format!(
                "Bus {} has been invalidated.",
                self.id
            )))
        }
    }

    /// Returns the id of the bus.
    pub fn id(&self) -> Result<&str, Error> {
        self.check_validity()?;
        Ok(&self.id)
    }

    /// Returns the voltage level the bus belongs to.
    pub fn voltage_level(&self) -> Result<VoltageLevelId, Error> {
        self.check_validity()?;
        Ok(self.voltage_level)
    }

    /// Returns the terminals grouped into this bus.
    pub fn terminals(&self) -> Result<&[TerminalId], Error> {
        self.check_validity()?;
        Ok(&self.terminals)
    }

    /// Returns the connected-component number of the bus, if it has been
    /// assigned one.
    pub fn connected_component_number(&self) -> Result<Option<usize>, Error> {
        self.check_validity()?;
        Ok(self.component.get())
    }

    /// The id, bypassing the validity check.  For internal bookkeeping of
    /// caches that outlive invalidation.
    pub(crate) fn raw_id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_component(&self, component: Option<usize>) {
        self.component.set(component);
    }

    pub(crate) fn invalidate(&self) {
        self.valid.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_fail_after_invalidation() {
        let bus = CalculatedBus::new("VL1_0".to_string(), VoltageLevelId(0), vec![TerminalId(3)]);
        assert_eq!(bus.id(), Ok("VL1_0"));
        assert_eq!(bus.terminals(), Ok(&[TerminalId(3)][..]));
        assert_eq!(bus.connected_component_number(), Ok(None));

        bus.invalidate();
        assert_eq!(
            bus.id(),
            Err(Error::invalidated_state("Bus VL1_0 has been invalidated."))
        );
        assert_eq!(
            bus.terminals(),
            Err(Error::invalidated_state("Bus VL1_0 has been invalidated."))
        );
    }
}
