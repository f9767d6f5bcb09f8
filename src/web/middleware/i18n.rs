use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::SUPPORTED_LOCALES;
use crate::web::{AppState, models::Locale};

/// Picks the primary `Accept-Language` tag when it is supported, otherwise
/// the configured default. The locale travels as a request extension.
pub async fn i18n_middleware(
    State(app_state): State<Arc<AppState>>,
    mut req: Request<AxumBody>,
    next: Next,
) -> Response {
    let requested = req
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(negotiate);

    let locale = requested.unwrap_or_else(|| app_state.config.default_locale.clone());
    req.extensions_mut().insert(Locale(locale));

    next.run(req).await
}

fn negotiate(accept_language: &str) -> Option<String> {
    let first = accept_language.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    let primary = tag.split(['-', '_']).next()?.to_ascii_lowercase();
    SUPPORTED_LOCALES
        .contains(&primary.as_str())
        .then_some(primary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_primary_tag() {
        assert_eq!(negotiate("en-US,en;q=0.9").as_deref(), Some("en"));
        assert_eq!(negotiate("ar-EG").as_deref(), Some("ar"));
        assert_eq!(negotiate("fr-FR,ar;q=0.5"), None);
        assert_eq!(negotiate(""), None);
    }
}
