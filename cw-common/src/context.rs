//! Explicit per-request identity
//!
//! Every core call receives a `RequestContext` built at the transport
//! boundary. Core code never reads user/client identity from ambient state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one learner interaction: who, which course, which tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub client_id: Uuid,
}

impl RequestContext {
    pub fn new(user_id: Uuid, course_id: Uuid, client_id: Uuid) -> Self {
        Self {
            user_id,
            course_id,
            client_id,
        }
    }

    /// All three identifiers must be present (non-nil) before any store access.
    pub fn is_complete(&self) -> bool {
        !self.user_id.is_nil() && !self.course_id.is_nil() && !self.client_id.is_nil()
    }
}
