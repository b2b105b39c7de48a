//! Interaction log sinks.

use async_trait::async_trait;
use lectern_core::{
    Result,
    traits::{Interaction, InteractionLog},
};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Emits one `info!` event per interaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInteractionLog;

#[async_trait]
impl InteractionLog for TracingInteractionLog {
    async fn record(&self, interaction: &Interaction) -> Result<()> {
        info!(
            target: "lectern::audit",
            owner = %interaction.owner_id,
            session = interaction.session_id.as_deref().unwrap_or("-"),
            route = %interaction.route,
            question = %interaction.question,
            references = ?interaction.reference_ids,
            failed = interaction.failed,
            elapsed_ms = interaction.elapsed_ms,
            "Interaction finished"
        );
        Ok(())
    }
}

/// Keeps interactions in memory.
#[derive(Debug, Default)]
pub struct MemoryInteractionLog {
    entries: Mutex<Vec<Interaction>>,
}

impl MemoryInteractionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded interactions, oldest first.
    pub fn entries(&self) -> Vec<Interaction> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded interactions.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InteractionLog for MemoryInteractionLog {
    async fn record(&self, interaction: &Interaction) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interaction.clone());
        Ok(())
    }
}
