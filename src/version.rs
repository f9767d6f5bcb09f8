/// Build version. Release pipelines stamp `AUTOHUB_VERSION`; local builds
/// report the crate version.
pub const VERSION: &str = match option_env!("AUTOHUB_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
