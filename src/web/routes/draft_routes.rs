use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use bytes::BytesMut;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::entities::{
    car_record::{self, CarDetails},
    edit_request,
};
use crate::db::memory_service::car_service;
use crate::navigation::Permission;
use crate::web::{
    AppState, ensure_permission,
    drafts::Draft,
    error::AppError,
    models::{AuthenticatedUser, Locale},
};
use crate::workflows::car_form::{
    AttachWarning, CarForm, CarFormPatch, CarSubmitOutcome, FormMode, ImageBatch, MAX_IMAGE_BYTES,
    MAX_IMAGES, PickedFile, SelectedFile,
};

pub fn create_draft_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(open_create_draft))
        .route(
            "/{id}",
            axum::routing::get(get_draft).put(patch_draft).delete(discard_draft),
        )
        .route("/{id}/images", post(attach_images))
        .route("/{id}/images/{index}", delete(remove_image))
        .route("/{id}/submit", post(submit_draft))
}

#[derive(Serialize)]
pub struct WarningView {
    #[serde(flatten)]
    warning: AttachWarning,
    message: String,
}

#[derive(Serialize)]
pub struct DraftView {
    id: String,
    mode: FormMode,
    data: CarDetails,
    errors: BTreeMap<&'static str, String>,
    max_images: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<WarningView>,
}

fn view(id: &str, form: &CarForm, locale: &Locale, warnings: Vec<AttachWarning>) -> DraftView {
    DraftView {
        id: id.to_string(),
        mode: form.mode().clone(),
        data: form.data().clone(),
        errors: form.errors().localized(locale.as_str()),
        max_images: MAX_IMAGES,
        warnings: warnings
            .into_iter()
            .map(|warning| WarningView {
                message: warning.message(locale.as_str()),
                warning,
            })
            .collect(),
    }
}

fn find_draft(state: &AppState, id: &str, user: &AuthenticatedUser) -> Result<Arc<Draft>, AppError> {
    state
        .drafts
        .get(id, &user.id)
        .ok_or_else(|| AppError::NotFound(format!("Draft {id} not found")))
}

async fn open_create_draft(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
) -> Result<(StatusCode, Json<DraftView>), AppError> {
    let actor = auth_user.actor();
    ensure_permission(&actor, Permission::CreateRecord)?;

    let form = CarForm::create(actor);
    let draft_view = view("", &form, &locale, Vec::new());
    let id = app_state.drafts.insert(&auth_user.id, form);
    debug!(draft_id = %id, user_id = %auth_user.id, "Create draft opened.");
    Ok((StatusCode::CREATED, Json(DraftView { id, ..draft_view })))
}

/// Seeds an edit-mode form from an existing record. Mounted under the car routes.
pub async fn open_edit_draft(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(record_id): Path<String>,
) -> Result<(StatusCode, Json<DraftView>), AppError> {
    let actor = auth_user.actor();
    ensure_permission(&actor, Permission::RequestRecordEdit)?;

    let record: car_record::Model = car_service::get_record(&app_state.backend.pool, &record_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Record {record_id} not found")))?;

    let form = CarForm::edit(actor, &record);
    let draft_view = view("", &form, &locale, Vec::new());
    let id = app_state.drafts.insert(&auth_user.id, form);
    debug!(draft_id = %id, record_id = %record_id, "Edit draft opened.");
    Ok((StatusCode::CREATED, Json(DraftView { id, ..draft_view })))
}

async fn get_draft(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    let draft = find_draft(&app_state, &id, &auth_user)?;
    let form = draft.form.lock().await;
    Ok(Json(view(&id, &form, &locale, Vec::new())))
}

async fn patch_draft(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
    Json(patch): Json<CarFormPatch>,
) -> Result<Json<DraftView>, AppError> {
    let draft = find_draft(&app_state, &id, &auth_user)?;
    let mut form = draft.form.lock().await;
    form.apply(patch);
    Ok(Json(view(&id, &form, &locale, Vec::new())))
}

async fn discard_draft(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    find_draft(&app_state, &id, &auth_user)?;
    app_state.drafts.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

/// Reads an upload batch without holding more than [`MAX_IMAGE_BYTES`] of any
/// one file. Reading stops at the free slots, and a body cut off by the
/// transport limit keeps the files read so far.
async fn read_image_batch(
    multipart: &mut Multipart,
    free_slots: usize,
) -> Result<ImageBatch, AppError> {
    let mut batch = ImageBatch::default();
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                warn!(error = %e, "Upload body limit reached between files.");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if batch.files.len() == free_slots {
            batch.overflowed = true;
            break;
        }
        let content_type = field.content_type().map(str::to_string);

        let mut data = BytesMut::new();
        let mut oversized = false;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if oversized {
                        continue;
                    }
                    if data.len() + chunk.len() > MAX_IMAGE_BYTES {
                        oversized = true;
                        data = BytesMut::new();
                    } else {
                        data.extend_from_slice(&chunk);
                    }
                }
                Ok(None) => break,
                Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    warn!(file = %name, error = %e, "Upload body limit reached mid-file.");
                    batch.files.push(PickedFile::Oversized { name });
                    return Ok(batch);
                }
                Err(e) => return Err(e.into()),
            }
        }

        batch.files.push(if oversized {
            PickedFile::Oversized { name }
        } else {
            PickedFile::Loaded(SelectedFile {
                name,
                content_type,
                data: data.freeze(),
            })
        });
    }
    Ok(batch)
}

async fn attach_images(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DraftView>, AppError> {
    let draft = find_draft(&app_state, &id, &auth_user)?;

    // Held across the upload so the free slot count stays accurate.
    let mut form = draft.form.lock().await;
    let batch = read_image_batch(&mut multipart, form.remaining_slots()).await?;
    let selected = batch.files.len();
    let warnings = form.attach_batch(batch).await;
    debug!(draft_id = %id, selected, attached = form.data().images.len(), warnings = warnings.len(), "Image batch processed.");
    Ok(Json(view(&id, &form, &locale, warnings)))
}

async fn remove_image(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<DraftView>, AppError> {
    let draft = find_draft(&app_state, &id, &auth_user)?;
    let mut form = draft.form.lock().await;
    form.remove_image(index);
    Ok(Json(view(&id, &form, &locale, Vec::new())))
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitResponse {
    Created {
        record: car_record::Model,
        draft: DraftView,
    },
    EditRequested {
        request: edit_request::Model,
        draft: DraftView,
    },
}

async fn submit_draft(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
) -> Result<Json<SubmitResponse>, AppError> {
    let draft = find_draft(&app_state, &id, &auth_user)?;
    let mut form = draft.form.lock().await;

    // The role may have changed since the draft was opened.
    let permission = match form.mode() {
        FormMode::Create => Permission::CreateRecord,
        FormMode::Edit { .. } => Permission::RequestRecordEdit,
    };
    ensure_permission(&auth_user.actor(), permission)?;

    match form.submit(&app_state.backend).await? {
        CarSubmitOutcome::Invalid(errors) => {
            Err(AppError::Validation(errors.localized(locale.as_str())))
        }
        CarSubmitOutcome::Created(record) => {
            info!(draft_id = %id, record_id = %record.id, "Draft submitted as new record.");
            Ok(Json(SubmitResponse::Created {
                record,
                draft: view(&id, &form, &locale, Vec::new()),
            }))
        }
        CarSubmitOutcome::EditRequested(request) => {
            info!(draft_id = %id, request_id = %request.id, "Draft submitted as edit request.");
            Ok(Json(SubmitResponse::EditRequested {
                request,
                draft: view(&id, &form, &locale, Vec::new()),
            }))
        }
    }
}
