use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    pub jwt_secret: String,

    /// Gemini key, read from `API_KEY`. Summaries fall back when absent.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_summary_timeout_secs")]
    pub summary_timeout_secs: u64,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// The admin account is only seeded when this is set.
    #[serde(default)]
    pub admin_password: Option<String>,

    /// Transport cap on one draft request body. Uploads are streamed, so
    /// memory per file stays bounded by the image size limit.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    /// Drafts untouched for this long are dropped by the sweeper.
    #[serde(default = "default_draft_idle_secs")]
    pub draft_idle_secs: u64,

    #[serde(default = "default_max_drafts_per_user")]
    pub max_drafts_per_user: usize,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    bind_address: Option<String>,
    jwt_secret: Option<String>,
    api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    summary_timeout_secs: Option<u64>,
    log_dir: Option<String>,
    default_locale: Option<String>,
    admin_username: Option<String>,
    admin_password: Option<String>,
    max_upload_bytes: Option<usize>,
    token_ttl_hours: Option<i64>,
    bcrypt_cost: Option<u32>,
    draft_idle_secs: Option<u64>,
    max_drafts_per_user: Option<usize>,
}

/// One year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_gemini_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_summary_timeout_secs() -> u64 {
    30
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_locale() -> String {
    crate::DEFAULT_LOCALE.to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_draft_idle_secs() -> u64 {
    60 * 60
}

fn default_max_drafts_per_user() -> usize {
    5
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        Self::layered(config_path, env_config)
    }

    /// Same as [`ServerConfig::load`] with an explicit set of variables in
    /// place of the process environment.
    pub fn load_with_vars<I>(config_path: Option<&str>, vars: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env_config: PartialServerConfig = envy::from_iter(vars)
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        Self::layered(config_path, env_config)
    }

    fn layered(config_path: Option<&str>, env_config: PartialServerConfig) -> Result<Self, String> {
        let file_config = match config_path {
            Some(path_str) => read_file_config(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        merge(env_config, file_config)
    }
}

fn read_file_config(path: &Path) -> Result<PartialServerConfig, String> {
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
    toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
}

// Environment overrides file.
fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Result<ServerConfig, String> {
    let default_locale = env
        .default_locale
        .or(file.default_locale)
        .unwrap_or_else(default_locale);
    if !crate::SUPPORTED_LOCALES.contains(&default_locale.as_str()) {
        return Err(format!("Unsupported default_locale: {default_locale}"));
    }

    let token_ttl_hours = env
        .token_ttl_hours
        .or(file.token_ttl_hours)
        .unwrap_or_else(default_token_ttl_hours);
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
        return Err(format!(
            "token_ttl_hours must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {token_ttl_hours}"
        ));
    }

    let max_drafts_per_user = env
        .max_drafts_per_user
        .or(file.max_drafts_per_user)
        .unwrap_or_else(default_max_drafts_per_user);
    if max_drafts_per_user == 0 {
        return Err("max_drafts_per_user must be at least 1".to_string());
    }

    let draft_idle_secs = env
        .draft_idle_secs
        .or(file.draft_idle_secs)
        .unwrap_or_else(default_draft_idle_secs);
    if draft_idle_secs == 0 {
        return Err("draft_idle_secs must be at least 1".to_string());
    }

    Ok(ServerConfig {
        bind_address: env
            .bind_address
            .or(file.bind_address)
            .unwrap_or_else(default_bind_address),
        jwt_secret: env
            .jwt_secret
            .or(file.jwt_secret)
            .ok_or("JWT_SECRET is required")?,
        api_key: env.api_key.or(file.api_key).filter(|k| !k.is_empty()),
        gemini_model: env
            .gemini_model
            .or(file.gemini_model)
            .unwrap_or_else(default_gemini_model),
        gemini_base_url: env
            .gemini_base_url
            .or(file.gemini_base_url)
            .unwrap_or_else(default_gemini_base_url),
        summary_timeout_secs: env
            .summary_timeout_secs
            .or(file.summary_timeout_secs)
            .unwrap_or_else(default_summary_timeout_secs),
        log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
        default_locale,
        admin_username: env
            .admin_username
            .or(file.admin_username)
            .unwrap_or_else(default_admin_username),
        admin_password: env.admin_password.or(file.admin_password),
        max_upload_bytes: env
            .max_upload_bytes
            .or(file.max_upload_bytes)
            .unwrap_or_else(default_max_upload_bytes),
        token_ttl_hours,
        bcrypt_cost: env
            .bcrypt_cost
            .or(file.bcrypt_cost)
            .unwrap_or_else(default_bcrypt_cost),
        draft_idle_secs,
        max_drafts_per_user,
    })
}
