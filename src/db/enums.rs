use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Closed set of account roles. Every user holds exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Inspector,
    Moderator,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::User,
        UserRole::Inspector,
        UserRole::Moderator,
        UserRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Inspector => "inspector",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }

    /// Roles a visitor may pick on the registration form.
    pub fn is_self_registrable(&self) -> bool {
        matches!(self, UserRole::User | UserRole::Inspector)
    }

    pub fn label(&self, locale: &str) -> String {
        match self {
            UserRole::User => t!("roles.user", locale = locale).into_owned(),
            UserRole::Inspector => t!("roles.inspector", locale = locale).into_owned(),
            UserRole::Moderator => t!("roles.moderator", locale = locale).into_owned(),
            UserRole::Admin => t!("roles.admin", locale = locale).into_owned(),
        }
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "inspector" => Ok(UserRole::Inspector),
            "moderator" => Ok(UserRole::Moderator),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    PendingEdit,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Active => f.write_str("active"),
            RecordStatus::PendingEdit => f.write_str("pending_edit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for EditRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditRequestStatus::Pending => f.write_str("pending"),
            EditRequestStatus::Approved => f.write_str("approved"),
            EditRequestStatus::Rejected => f.write_str("rejected"),
        }
    }
}

pub const CAR_BRANDS: &[&str] = &[
    "Toyota",
    "Hyundai",
    "Kia",
    "Nissan",
    "Chevrolet",
    "Mitsubishi",
    "Honda",
    "Suzuki",
    "Mercedes-Benz",
    "BMW",
    "Audi",
    "Volkswagen",
    "Skoda",
    "Seat",
    "Peugeot",
    "Renault",
    "Citroen",
    "Fiat",
    "Opel",
    "Ford",
    "Jeep",
    "MG",
    "Chery",
    "BYD",
    "Geely",
    "Mazda",
    "Subaru",
    "Lada",
];

pub const CAR_COLORS: &[&str] = &[
    "أبيض",
    "أسود",
    "فضي",
    "رمادي",
    "أحمر",
    "أزرق",
    "أخضر",
    "بيج",
    "بني",
    "ذهبي",
    "أصفر",
    "برتقالي",
    "نبيتي",
    "كحلي",
];

pub fn is_known_brand(brand: &str) -> bool {
    CAR_BRANDS.contains(&brand)
}

pub fn is_known_color(color: &str) -> bool {
    CAR_COLORS.contains(&color)
}
