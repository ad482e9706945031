// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Change notification for observable topology mutations.
//!
//! Every mutation that affects observable state — a switch opening or
//! closing, equipment appearing or disappearing — is reported to the
//! registered listeners, in the causal order of the mutations.

/// Observes changes made to a [`Network`][crate::Network].
///
/// All methods have empty default bodies so implementations only override
/// the events they care about.
pub trait NetworkListener {
    /// An identifiable object (switch, connectable) was created.
    fn on_creation(&mut self, _id: &str) {}

    /// An identifiable object was removed.
    fn on_removal(&mut self, _id: &str) {}

    /// An attribute of an identifiable object changed value.
    fn on_update(&mut self, _id: &str, _attribute: &str, _old_value: &str, _new_value: &str) {}
}
