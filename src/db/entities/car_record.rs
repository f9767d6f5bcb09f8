use serde::{Deserialize, Serialize};

use crate::db::enums::RecordStatus;

/// The user-editable part of an inspection record. Shared by new records,
/// edit proposals and the car form itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarDetails {
    pub brand: String,
    #[serde(rename = "type")]
    pub car_type: String,
    pub model: String,
    pub color: String,
    pub chassis_number: String,
    pub mileage: i64,
    pub notes: String,
    /// Inline `data:` URLs.
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(flatten)]
    pub details: CarDetails,
    pub inspection_date: chrono::DateTime<chrono::Utc>,
    pub inspector_id: String,
    pub inspector_name: String,
    pub status: RecordStatus,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Model {
    /// Chassis numbers are entered freely but always shown uppercased.
    pub fn chassis_display(&self) -> String {
        self.details.chassis_number.to_uppercase()
    }
}
