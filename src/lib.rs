pub mod db;
pub mod navigation;
pub mod server;
pub mod services;
pub mod validation;
pub mod version;
pub mod web;
pub mod workflows;

#[macro_use]
extern crate rust_i18n;

// Load all translations from the locales directory
i18n!("locales", fallback = "ar");

pub const DEFAULT_LOCALE: &str = "ar";
pub const SUPPORTED_LOCALES: &[&str] = &["ar", "en"];
