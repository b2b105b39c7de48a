//! Interaction audit trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, types::QueryKind};

/// Record of one finished interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Owner who asked.
    pub owner_id: Uuid,
    /// Session, if known.
    pub session_id: Option<String>,
    /// Question text.
    pub question: String,
    /// Route taken.
    pub route: QueryKind,
    /// Answer text, or the user-facing failure message.
    pub answer: String,
    /// Cited article ids.
    pub reference_ids: Vec<Uuid>,
    /// Whether the interaction failed.
    pub failed: bool,
    /// When the question was issued.
    pub issued_at: DateTime<Utc>,
    /// Wall time spent answering, in milliseconds.
    pub elapsed_ms: u64,
}

/// Sink for finished interactions. Failures here never fail a query.
#[async_trait]
pub trait InteractionLog: Send + Sync + std::fmt::Debug {
    /// Persist one interaction.
    async fn record(&self, interaction: &Interaction) -> Result<()>;
}
