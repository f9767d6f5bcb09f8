//! Form workflows. Each one validates locally and hands plain data to a
//! caller-supplied backend trait; none of them owns persistence.

pub mod auth_form;
pub mod car_form;
pub mod user_management;

use serde::Serialize;

use crate::db::{entities::user, enums::UserRole};
use crate::navigation::{Capabilities, Permission, capabilities};

/// The acting user, threaded explicitly into every workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: String,
    pub username: String,
    pub role: UserRole,
}

impl Actor {
    pub fn capabilities(&self) -> &'static Capabilities {
        capabilities(self.role)
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.capabilities().permits(permission)
    }
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}
