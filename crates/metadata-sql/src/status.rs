use serde::{Deserialize, Serialize};

/// The health of a projection's last completed (or attempted) rebuild
/// cycle, stored alongside its checkpoint in `ctl_projection_metadata`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "projection_status")]
#[sqlx(rename_all = "snake_case")]
pub enum Status {
    Init,
    Ok,
    Error,
}
