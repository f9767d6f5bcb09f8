//! Role capability table and the navigation shell built on it.
//!
//! Every role maps to one static [`Capabilities`] entry. Both the menu and
//! the mutation guards read from this table, so a role's reach is decided in
//! one place.

use serde::{Deserialize, Serialize};

use crate::db::enums::UserRole;
use crate::workflows::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Dashboard,
    Cars,
    AddCar,
    Users,
    Requests,
}

impl Destination {
    fn icon(&self) -> &'static str {
        match self {
            Destination::Dashboard => "chart-line",
            Destination::Cars => "search",
            Destination::AddCar => "plus-circle",
            Destination::Users => "users-cog",
            Destination::Requests => "clipboard-check",
        }
    }

    fn label(&self, locale: &str) -> String {
        match self {
            Destination::Dashboard => t!("nav.dashboard", locale = locale),
            Destination::Cars => t!("nav.cars", locale = locale),
            Destination::AddCar => t!("nav.add_car", locale = locale),
            Destination::Users => t!("nav.users", locale = locale),
            Destination::Requests => t!("nav.requests", locale = locale),
        }
        .into_owned()
    }

    fn is_administration(&self) -> bool {
        matches!(self, Destination::Users | Destination::Requests)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreateRecord,
    RequestRecordEdit,
    ReviewEditRequests,
    ViewUsers,
    ToggleUserStatus,
    UpdateUserRole,
    DeleteUser,
    UpdateUserPassword,
}

#[derive(Debug)]
pub struct Capabilities {
    pub destinations: &'static [Destination],
    pub permissions: &'static [Permission],
    /// Whether the sidebar and bottom navigation are rendered at all.
    pub shows_navigation: bool,
}

impl Capabilities {
    pub fn can_visit(&self, destination: Destination) -> bool {
        self.destinations.contains(&destination)
    }

    pub fn permits(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

static USER: Capabilities = Capabilities {
    destinations: &[Destination::Dashboard, Destination::Cars],
    permissions: &[],
    shows_navigation: false,
};

static INSPECTOR: Capabilities = Capabilities {
    destinations: &[Destination::Dashboard, Destination::Cars, Destination::AddCar],
    permissions: &[Permission::CreateRecord, Permission::RequestRecordEdit],
    shows_navigation: true,
};

static MODERATOR: Capabilities = Capabilities {
    destinations: &[
        Destination::Dashboard,
        Destination::Cars,
        Destination::AddCar,
        Destination::Users,
        Destination::Requests,
    ],
    permissions: &[
        Permission::CreateRecord,
        Permission::RequestRecordEdit,
        Permission::ReviewEditRequests,
        Permission::ViewUsers,
        Permission::ToggleUserStatus,
        Permission::UpdateUserRole,
    ],
    shows_navigation: true,
};

static ADMIN: Capabilities = Capabilities {
    destinations: &[
        Destination::Dashboard,
        Destination::Cars,
        Destination::AddCar,
        Destination::Users,
        Destination::Requests,
    ],
    permissions: &[
        Permission::CreateRecord,
        Permission::RequestRecordEdit,
        Permission::ReviewEditRequests,
        Permission::ViewUsers,
        Permission::ToggleUserStatus,
        Permission::UpdateUserRole,
        Permission::DeleteUser,
        Permission::UpdateUserPassword,
    ],
    shows_navigation: true,
};

pub fn capabilities(role: UserRole) -> &'static Capabilities {
    match role {
        UserRole::User => &USER,
        UserRole::Inspector => &INSPECTOR,
        UserRole::Moderator => &MODERATOR,
        UserRole::Admin => &ADMIN,
    }
}

#[derive(Debug, Serialize)]
pub struct NavItem {
    pub destination: Destination,
    pub label: String,
    pub icon: &'static str,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShellView {
    pub username: String,
    pub role: UserRole,
    pub role_label: String,
    pub active: Destination,
    pub destinations: Vec<Destination>,
    pub show_sidebar: bool,
    pub sidebar: Vec<NavItem>,
    pub bottom_nav: Vec<NavItem>,
}

/// Holds the acting user and the active destination. The selection itself is
/// owned by the caller; the shell only refuses destinations the role cannot
/// visit.
#[derive(Debug, Clone)]
pub struct Shell {
    actor: Actor,
    active: Destination,
}

impl Shell {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            active: Destination::Dashboard,
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn active(&self) -> Destination {
        self.active
    }

    /// Returns false and keeps the current destination when the role may
    /// not visit `destination`.
    pub fn set_active(&mut self, destination: Destination) -> bool {
        if self.actor.capabilities().can_visit(destination) {
            self.active = destination;
            true
        } else {
            false
        }
    }

    pub fn view(&self, locale: &str) -> ShellView {
        let caps = self.actor.capabilities();
        let item = |destination: Destination| NavItem {
            destination,
            label: destination.label(locale),
            icon: destination.icon(),
            active: destination == self.active,
            section: destination
                .is_administration()
                .then(|| t!("nav.administration", locale = locale).into_owned()),
        };

        let (sidebar, bottom_nav) = if caps.shows_navigation {
            (
                caps.destinations.iter().copied().map(item).collect(),
                caps.destinations
                    .iter()
                    .copied()
                    .filter(|d| *d != Destination::Requests)
                    .map(item)
                    .collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        ShellView {
            username: self.actor.username.clone(),
            role: self.actor.role,
            role_label: self.actor.role.label(locale),
            active: self.active,
            destinations: caps.destinations.to_vec(),
            show_sidebar: caps.shows_navigation,
            sidebar,
            bottom_nav,
        }
    }
}
