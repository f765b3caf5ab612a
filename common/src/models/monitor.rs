//! Pool monitoring models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Connection pool statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ConnectionPoolStats {
    /// Connections currently checked out.
    pub active: u32,
    /// Idle connections.
    pub idle: u32,
    /// Maximum pool size.
    pub max_size: u32,
    /// Whether the pool is still open.
    pub is_connected: bool,
}
