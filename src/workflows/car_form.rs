use async_trait::async_trait;
use base64::{Engine as _, prelude::BASE64_STANDARD};
use bytes::Bytes;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Actor;
use crate::db::{
    entities::{
        car_record::{self, CarDetails},
        edit_request,
    },
    enums,
};
use crate::validation::{self, Field, FieldError, FieldErrors};
use crate::web::error::AppError;

pub const MAX_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;

/// Persistence callbacks for the car form.
#[async_trait]
pub trait CarRecordBackend: Send + Sync {
    async fn create_record(
        &self,
        actor: &Actor,
        details: CarDetails,
    ) -> Result<car_record::Model, AppError>;

    async fn request_edit(
        &self,
        actor: &Actor,
        record_id: &str,
        details: CarDetails,
    ) -> Result<edit_request::Model, AppError>;
}

/// One file picked by the user, before encoding.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A file as read from an upload. Oversized files are recognised while
/// streaming and never buffered.
#[derive(Debug, Clone)]
pub enum PickedFile {
    Loaded(SelectedFile),
    Oversized { name: String },
}

/// One upload batch in selection order. `overflowed` is set when the reader
/// stopped at the free slots with more files still coming.
#[derive(Debug, Clone, Default)]
pub struct ImageBatch {
    pub files: Vec<PickedFile>,
    pub overflowed: bool,
}

/// Non-blocking notices produced while attaching a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachWarning {
    TooManyImages,
    FileTooLarge { name: String },
}

impl AttachWarning {
    pub fn message(&self, locale: &str) -> String {
        match self {
            AttachWarning::TooManyImages => t!("images.too_many", locale = locale).into_owned(),
            AttachWarning::FileTooLarge { name } => {
                t!("images.too_large", locale = locale, name = name).into_owned()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormMode {
    Create,
    Edit { record_id: String },
}

/// Field replacements sent by the client. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarFormPatch {
    pub brand: Option<String>,
    #[serde(rename = "type")]
    pub car_type: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub chassis_number: Option<String>,
    pub mileage: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub enum CarSubmitOutcome {
    Invalid(FieldErrors),
    Created(car_record::Model),
    EditRequested(edit_request::Model),
}

#[derive(Debug)]
pub struct CarForm {
    actor: Actor,
    mode: FormMode,
    data: CarDetails,
    errors: FieldErrors,
}

impl CarForm {
    pub fn create(actor: Actor) -> Self {
        Self {
            actor,
            mode: FormMode::Create,
            data: CarDetails::default(),
            errors: FieldErrors::new(),
        }
    }

    pub fn edit(actor: Actor, record: &car_record::Model) -> Self {
        Self {
            actor,
            mode: FormMode::Edit {
                record_id: record.id.clone(),
            },
            data: record.details.clone(),
            errors: FieldErrors::new(),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn data(&self) -> &CarDetails {
        &self.data
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn apply(&mut self, patch: CarFormPatch) {
        let data = &mut self.data;
        let errors = &mut self.errors;
        let mut set = |field: Field, slot: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *slot = value;
                errors.remove(field);
            }
        };
        set(Field::Brand, &mut data.brand, patch.brand);
        set(Field::Type, &mut data.car_type, patch.car_type);
        set(Field::Model, &mut data.model, patch.model);
        set(Field::Color, &mut data.color, patch.color);
        set(Field::ChassisNumber, &mut data.chassis_number, patch.chassis_number);
        set(Field::Notes, &mut data.notes, patch.notes);
        if let Some(mileage) = patch.mileage {
            data.mileage = mileage;
            errors.remove(Field::Mileage);
        }
    }

    pub fn remaining_slots(&self) -> usize {
        MAX_IMAGES.saturating_sub(self.data.images.len())
    }

    /// Attaches a batch of selected files. Files past the remaining slots and
    /// files over [`MAX_IMAGE_BYTES`] are dropped with a warning; the others
    /// are encoded concurrently and appended once the whole batch is done.
    pub async fn attach_images(&mut self, files: Vec<SelectedFile>) -> Vec<AttachWarning> {
        self.attach_batch(ImageBatch {
            files: files.into_iter().map(PickedFile::Loaded).collect(),
            overflowed: false,
        })
        .await
    }

    pub async fn attach_batch(&mut self, batch: ImageBatch) -> Vec<AttachWarning> {
        let mut warnings = Vec::new();
        let remaining = self.remaining_slots();
        if batch.overflowed || batch.files.len() > remaining {
            warnings.push(AttachWarning::TooManyImages);
        }

        let mut encodes = Vec::new();
        for picked in batch.files.into_iter().take(remaining) {
            match picked {
                PickedFile::Loaded(file) if file.data.len() <= MAX_IMAGE_BYTES => {
                    encodes.push(encode_inline(file));
                }
                PickedFile::Loaded(SelectedFile { name, .. }) | PickedFile::Oversized { name } => {
                    warnings.push(AttachWarning::FileTooLarge { name });
                }
            }
        }

        let encoded = join_all(encodes).await;
        self.data.images.extend(encoded.into_iter().flatten());
        warnings
    }

    /// Out-of-range indexes are ignored.
    pub fn remove_image(&mut self, index: usize) -> bool {
        if index < self.data.images.len() {
            self.data.images.remove(index);
            true
        } else {
            false
        }
    }

    pub fn validate(&mut self) -> bool {
        let data = &self.data;
        let mut errors = FieldErrors::new();

        errors.check(Field::Brand, validation::require(&data.brand));
        if !errors.contains(Field::Brand) && !enums::is_known_brand(data.brand.trim()) {
            errors.insert(Field::Brand, FieldError::NotSelectable);
        }
        errors.check(Field::Type, validation::require(&data.car_type));
        errors.check(Field::Model, validation::require(&data.model));
        errors.check(Field::Color, validation::require(&data.color));
        if !errors.contains(Field::Color) && !enums::is_known_color(data.color.trim()) {
            errors.insert(Field::Color, FieldError::NotSelectable);
        }
        errors.check(Field::ChassisNumber, validation::require(&data.chassis_number));
        errors.check(Field::Mileage, validation::check_mileage(data.mileage));
        errors.check(Field::Notes, validation::require(&data.notes));

        self.errors = errors;
        self.errors.is_empty()
    }

    pub async fn submit<B>(&mut self, backend: &B) -> Result<CarSubmitOutcome, AppError>
    where
        B: CarRecordBackend + ?Sized,
    {
        if !self.validate() {
            return Ok(CarSubmitOutcome::Invalid(self.errors.clone()));
        }

        match &self.mode {
            FormMode::Create => {
                let record = backend.create_record(&self.actor, self.data.clone()).await?;
                self.data = CarDetails::default();
                Ok(CarSubmitOutcome::Created(record))
            }
            FormMode::Edit { record_id } => {
                let request = backend
                    .request_edit(&self.actor, record_id, self.data.clone())
                    .await?;
                Ok(CarSubmitOutcome::EditRequested(request))
            }
        }
    }
}

async fn encode_inline(file: SelectedFile) -> Option<String> {
    let name = file.name.clone();
    match tokio::task::spawn_blocking(move || to_data_url(&file)).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(file = %name, error = %e, "Image encoding task failed; image skipped.");
            None
        }
    }
}

/// `data:<mime>;base64,<payload>`. The declared content type wins over the
/// guess from the file name.
pub fn to_data_url(file: &SelectedFile) -> String {
    let mime = file
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&file.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
    format!("data:{mime};base64,{}", BASE64_STANDARD.encode(&file.data))
}
