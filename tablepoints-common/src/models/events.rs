// File: tablepoints-common/src/models/events.rs
//
// Inputs handed to the points core by its collaborators (ordering, reviews).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaid {
    pub order_id: String,
    pub user_id: Uuid,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewApproved {
    pub review_id: String,
    pub user_id: Uuid,
    pub has_images: bool,
    pub is_first_review: bool,
}

/// Result of checking a proposed spend. Never an error: the reasons are
/// meant for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendValidation {
    pub valid: bool,
    pub reasons: Vec<String>,
    pub max_usable_points: i64,
}
