//! Internal change-hook dispatcher.
//!
//! The document reacts to its own edits through a small set of named stages
//! rather than closures: storing a closure that mutates the document inside
//! the document would be self-referential. Each toggle subscribes its stage
//! and keeps the returned handle; dispatch walks the stages in subscription
//! order and the document matches on the stage value to run the work.
//!
//! Handles are generational slotmap keys, so unsubscribing twice (or with a
//! handle from a previous subscription) is a safe no-op.

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle for one subscribed change stage.
    pub struct HookId;
}

/// What a subscribed hook does when the document contents change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStage {
    /// Rescan the edited blocks for emoji graphemes.
    Twemojize,
    /// Rewrite `:alias:` tokens across the whole document.
    ReplaceAliases,
    /// Trim leading blocks while over the line limit.
    EnforceLineLimit,
}

/// Subscription table for change stages.
#[derive(Debug, Default)]
pub struct ChangeHooks {
    stages: SlotMap<HookId, ChangeStage>,
    /// Subscription order; slotmap iteration order is unspecified.
    order: Vec<HookId>,
}

impl ChangeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a stage; it will run after already-subscribed stages.
    pub fn subscribe(&mut self, stage: ChangeStage) -> HookId {
        let id = self.stages.insert(stage);
        self.order.push(id);
        id
    }

    /// Unsubscribe by handle. Returns `false` for stale handles.
    pub fn unsubscribe(&mut self, id: HookId) -> bool {
        let removed = self.stages.remove(id).is_some();
        if removed {
            self.order.retain(|entry| *entry != id);
        }
        removed
    }

    /// Snapshot of the subscribed stages in subscription order.
    ///
    /// Dispatch iterates the snapshot so stages may subscribe or
    /// unsubscribe other stages while running.
    pub fn stages_in_order(&self) -> Vec<ChangeStage> {
        self.order
            .iter()
            .filter_map(|id| self.stages.get(*id).copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
