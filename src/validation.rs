//! Field-level checks shared by the authentication and car-record forms.
//!
//! Validation failures are data, not faults: every check produces a
//! [`FieldError`] keyed by the [`Field`] it concerns, and the caller decides
//! how to render it. Messages are resolved against the locale files at
//! render time.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Username,
    Password,
    Role,
    NationalId,
    Brand,
    #[serde(rename = "type")]
    Type,
    Model,
    Color,
    ChassisNumber,
    Mileage,
    Notes,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::Password => "password",
            Field::Role => "role",
            Field::NationalId => "national_id",
            Field::Brand => "brand",
            Field::Type => "type",
            Field::Model => "model",
            Field::Color => "color",
            Field::ChassisNumber => "chassis_number",
            Field::Mileage => "mileage",
            Field::Notes => "notes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    Required,
    NotAsciiAlphanumeric,
    InvalidNationalId,
    NotSelectable,
    Negative,
}

impl FieldError {
    pub fn message(&self, field: Field, locale: &str) -> String {
        let message = match (field, self) {
            (Field::Username, FieldError::Required) => {
                t!("validation.username_required", locale = locale)
            }
            (Field::Password, FieldError::Required) => {
                t!("validation.password_required", locale = locale)
            }
            (_, FieldError::NotAsciiAlphanumeric) => {
                t!("validation.ascii_alphanumeric_only", locale = locale)
            }
            (Field::NationalId, FieldError::Required) => {
                t!("validation.national_id_required", locale = locale)
            }
            (_, FieldError::InvalidNationalId) => {
                t!("validation.national_id_format", locale = locale)
            }
            (Field::Role, _) => t!("validation.role_not_selectable", locale = locale),
            (Field::Brand, _) => t!("validation.brand_required", locale = locale),
            (Field::Type, _) => t!("validation.type_required", locale = locale),
            (Field::Model, _) => t!("validation.model_required", locale = locale),
            (Field::Color, _) => t!("validation.color_required", locale = locale),
            (Field::ChassisNumber, _) => t!("validation.chassis_number_required", locale = locale),
            (Field::Mileage, _) => t!("validation.mileage_negative", locale = locale),
            (Field::Notes, _) => t!("validation.notes_required", locale = locale),
            (Field::Username | Field::Password | Field::NationalId, _) => {
                t!("validation.ascii_alphanumeric_only", locale = locale)
            }
        };
        message.into_owned()
    }
}

/// Errors of one form submission, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, error: FieldError) {
        self.0.insert(field, error);
    }

    pub fn remove(&mut self, field: Field) -> Option<FieldError> {
        self.0.remove(&field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn get(&self, field: Field) -> Option<FieldError> {
        self.0.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn check(&mut self, field: Field, result: Result<(), FieldError>) {
        if let Err(error) = result {
            self.insert(field, error);
        }
    }

    pub fn localized(&self, locale: &str) -> BTreeMap<&'static str, String> {
        self.0
            .iter()
            .map(|(field, error)| (field.as_str(), error.message(*field, locale)))
            .collect()
    }
}

/// `[A-Za-z0-9]*`. Presence is checked separately.
pub fn is_ascii_alphanumeric(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn is_national_id(value: &str) -> bool {
    value.len() == 14 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Trims a username or password and checks it is present and ASCII
/// alphanumeric. Returns the trimmed value.
pub fn check_credential(value: &str) -> Result<&str, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Required);
    }
    if !is_ascii_alphanumeric(trimmed) {
        return Err(FieldError::NotAsciiAlphanumeric);
    }
    Ok(trimmed)
}

pub fn require(value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        Err(FieldError::Required)
    } else {
        Ok(())
    }
}

pub fn check_national_id(value: &str) -> Result<(), FieldError> {
    if value.is_empty() {
        Err(FieldError::Required)
    } else if !is_national_id(value) {
        Err(FieldError::InvalidNationalId)
    } else {
        Ok(())
    }
}

pub fn check_mileage(mileage: i64) -> Result<(), FieldError> {
    if mileage < 0 {
        Err(FieldError::Negative)
    } else {
        Ok(())
    }
}
