use serde::{Deserialize, Serialize};

use super::car_record::CarDetails;
use crate::db::enums::EditRequestStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub record_id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub proposed: CarDetails,
    pub status: EditRequestStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
}
