//! Per-consumer visibility masks

use std::collections::HashSet;

/// Actors and components hidden from every capture pass.
///
/// Mutated by the embedding application through explicit hide/show calls;
/// the orchestrator only ever reads it, once per capture.
#[derive(Debug, Default, Clone)]
pub struct CaptureContext {
    hidden_actors: HashSet<u64>,
    hidden_components: HashSet<u64>,
}

impl CaptureContext {
    /// An empty mask hiding nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide an actor from capture renders.
    pub fn hide_actor(&mut self, actor: u64) {
        self.hidden_actors.insert(actor);
    }

    /// Undo [`hide_actor`](Self::hide_actor). Unknown ids are ignored.
    pub fn show_actor(&mut self, actor: u64) {
        self.hidden_actors.remove(&actor);
    }

    /// Hide a single component from capture renders.
    pub fn hide_component(&mut self, component: u64) {
        self.hidden_components.insert(component);
    }

    /// Undo [`hide_component`](Self::hide_component). Unknown ids are
    /// ignored.
    pub fn show_component(&mut self, component: u64) {
        self.hidden_components.remove(&component);
    }

    /// The hidden actor set.
    pub fn hidden_actors(&self) -> &HashSet<u64> {
        &self.hidden_actors
    }

    /// The hidden component set.
    pub fn hidden_components(&self) -> &HashSet<u64> {
        &self.hidden_components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_and_show_round_trip() {
        let mut context = CaptureContext::new();
        context.hide_actor(42);
        context.hide_component(7);
        assert!(context.hidden_actors().contains(&42));
        assert!(context.hidden_components().contains(&7));

        context.show_actor(42);
        context.show_component(7);
        assert!(context.hidden_actors().is_empty());
        assert!(context.hidden_components().is_empty());
    }

    #[test]
    fn showing_unknown_ids_is_a_no_op() {
        let mut context = CaptureContext::new();
        context.show_actor(99);
        assert!(context.hidden_actors().is_empty());
    }
}
