use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::features::files::models::UserId;

/// Caller identity resolved by the upstream gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}
