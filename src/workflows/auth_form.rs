use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{entities::user, enums::UserRole};
use crate::validation::{self, Field, FieldError, FieldErrors};
use crate::web::error::AppError;

/// Persistence callbacks for the authentication form.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Receives trimmed, already validated credentials.
    async fn login(&self, username: &str, password: &str) -> Result<user::Model, AppError>;

    async fn register(&self, registration: Registration) -> Result<user::Model, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    /// Only carried for inspectors.
    pub national_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthFormData {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    pub national_id: String,
}

#[derive(Debug)]
pub enum AuthOutcome {
    Invalid(FieldErrors),
    LoggedIn(user::Model),
    Registered(user::Model),
}

#[derive(Debug, Default)]
pub struct AuthForm {
    mode: AuthMode,
    data: AuthFormData,
    errors: FieldErrors,
}

impl AuthForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mode: AuthMode, data: AuthFormData) -> Self {
        Self {
            mode,
            data,
            errors: FieldErrors::new(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn data(&self) -> &AuthFormData {
        &self.data
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn switch_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
        self.errors.clear();
    }

    pub fn set_username(&mut self, value: impl Into<String>) {
        self.data.username = value.into();
        self.errors.remove(Field::Username);
    }

    pub fn set_password(&mut self, value: impl Into<String>) {
        self.data.password = value.into();
        self.errors.remove(Field::Password);
    }

    pub fn set_role(&mut self, role: UserRole) {
        self.data.role = role;
        self.errors.remove(Field::Role);
    }

    pub fn set_national_id(&mut self, value: impl Into<String>) {
        self.data.national_id = value.into();
        self.errors.remove(Field::NationalId);
    }

    /// Recomputes the error set from scratch. Returns true when the form may
    /// be submitted.
    pub fn validate(&mut self) -> bool {
        let mut errors = FieldErrors::new();
        errors.check(
            Field::Username,
            validation::check_credential(&self.data.username).map(|_| ()),
        );
        errors.check(
            Field::Password,
            validation::check_credential(&self.data.password).map(|_| ()),
        );

        if self.mode == AuthMode::Register {
            if !self.data.role.is_self_registrable() {
                errors.insert(Field::Role, FieldError::NotSelectable);
            }
            if self.data.role == UserRole::Inspector {
                errors.check(
                    Field::NationalId,
                    validation::check_national_id(&self.data.national_id),
                );
            }
        }

        self.errors = errors;
        self.errors.is_empty()
    }

    pub async fn submit<B>(&mut self, backend: &B) -> Result<AuthOutcome, AppError>
    where
        B: AuthBackend + ?Sized,
    {
        if !self.validate() {
            return Ok(AuthOutcome::Invalid(self.errors.clone()));
        }

        let username = self.data.username.trim().to_string();
        let password = self.data.password.trim().to_string();

        match self.mode {
            AuthMode::Login => {
                let user = backend.login(&username, &password).await?;
                Ok(AuthOutcome::LoggedIn(user))
            }
            AuthMode::Register => {
                let role = self.data.role;
                let registration = Registration {
                    username,
                    password,
                    role,
                    national_id: (role == UserRole::Inspector)
                        .then(|| self.data.national_id.clone()),
                };
                let user = backend.register(registration).await?;
                self.mode = AuthMode::Login;
                self.data.password.clear();
                Ok(AuthOutcome::Registered(user))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        logins: Mutex<Vec<(String, String)>>,
        registrations: Mutex<Vec<Registration>>,
        reject_registration: bool,
    }

    fn model(username: &str, role: UserRole) -> user::Model {
        user::Model {
            id: "u1".to_string(),
            username: username.to_string(),
            password_hash: String::new(),
            role,
            national_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl AuthBackend for RecordingBackend {
        async fn login(&self, username: &str, password: &str) -> Result<user::Model, AppError> {
            self.logins
                .lock()
                .unwrap()
                .push((username.to_string(), password.to_string()));
            Ok(model(username, UserRole::User))
        }

        async fn register(&self, registration: Registration) -> Result<user::Model, AppError> {
            if self.reject_registration {
                return Err(AppError::UserAlreadyExists(registration.username));
            }
            let user = model(&registration.username, registration.role);
            self.registrations.lock().unwrap().push(registration);
            Ok(user)
        }
    }

    fn register_form(username: &str, password: &str, role: UserRole, national_id: &str) -> AuthForm {
        AuthForm::with_data(
            AuthMode::Register,
            AuthFormData {
                username: username.to_string(),
                password: password.to_string(),
                role,
                national_id: national_id.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_login_rejects_spaces_and_non_ascii_without_calling_backend() {
        let backend = RecordingBackend::default();
        for (username, password) in [("ali hassan", "pass1"), ("عمر", "pass1"), ("omar", "p@ss"), ("", "x")] {
            let mut form = AuthForm::new();
            form.set_username(username);
            form.set_password(password);
            let outcome = form.submit(&backend).await.unwrap();
            assert!(matches!(outcome, AuthOutcome::Invalid(_)), "{username}/{password}");
        }
        assert!(backend.logins.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_passes_trimmed_credentials() {
        let backend = RecordingBackend::default();
        let mut form = AuthForm::new();
        form.set_username("  omar ");
        form.set_password(" secret1 ");
        let outcome = form.submit(&backend).await.unwrap();
        assert!(matches!(outcome, AuthOutcome::LoggedIn(_)));
        assert_eq!(
            backend.logins.lock().unwrap().as_slice(),
            &[("omar".to_string(), "secret1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_inspector_registration_requires_fourteen_digit_national_id() {
        let backend = RecordingBackend::default();
        for bad_id in ["", "123", "2991010123456x", "299101012345678"] {
            let mut form = register_form("insp1", "pw1", UserRole::Inspector, bad_id);
            let outcome = form.submit(&backend).await.unwrap();
            match outcome {
                AuthOutcome::Invalid(errors) => assert!(errors.contains(Field::NationalId)),
                other => panic!("expected invalid, got {other:?}"),
            }
        }
        assert!(backend.registrations.lock().unwrap().is_empty());

        let mut form = register_form("insp1", "pw1", UserRole::Inspector, "29910101234567");
        assert!(matches!(form.submit(&backend).await.unwrap(), AuthOutcome::Registered(_)));
        let registrations = backend.registrations.lock().unwrap();
        assert_eq!(registrations[0].national_id.as_deref(), Some("29910101234567"));
    }

    #[tokio::test]
    async fn test_ordinary_user_ignores_national_id_content() {
        let backend = RecordingBackend::default();
        let mut form = register_form("viewer", "pw1", UserRole::User, "not digits");
        assert!(matches!(form.submit(&backend).await.unwrap(), AuthOutcome::Registered(_)));
        assert_eq!(backend.registrations.lock().unwrap()[0].national_id, None);
    }

    #[tokio::test]
    async fn test_registration_of_privileged_role_is_refused() {
        let backend = RecordingBackend::default();
        let mut form = register_form("boss", "pw1", UserRole::Admin, "");
        match form.submit(&backend).await.unwrap() {
            AuthOutcome::Invalid(errors) => {
                assert_eq!(errors.get(Field::Role), Some(FieldError::NotSelectable))
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_registration_switches_to_login_and_clears_password() {
        let backend = RecordingBackend::default();
        let mut form = register_form("newbie", "pw1", UserRole::User, "");
        form.submit(&backend).await.unwrap();
        assert_eq!(form.mode(), AuthMode::Login);
        assert!(form.data().password.is_empty());
        assert_eq!(form.data().username, "newbie");
    }

    #[tokio::test]
    async fn test_failed_registration_keeps_register_mode() {
        let backend = RecordingBackend {
            reject_registration: true,
            ..Default::default()
        };
        let mut form = register_form("taken", "pw1", UserRole::User, "");
        assert!(form.submit(&backend).await.is_err());
        assert_eq!(form.mode(), AuthMode::Register);
        assert_eq!(form.data().password, "pw1");
    }

    #[test]
    fn test_editing_a_field_clears_only_its_error() {
        let mut form = AuthForm::new();
        assert!(!form.validate());
        assert!(form.errors().contains(Field::Username));
        assert!(form.errors().contains(Field::Password));

        form.set_username("omar");
        assert!(!form.errors().contains(Field::Username));
        assert!(form.errors().contains(Field::Password));

        form.switch_mode(AuthMode::Register);
        assert!(form.errors().is_empty());
    }
}
