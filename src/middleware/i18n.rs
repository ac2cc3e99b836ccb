// src/middleware/i18n.rs

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use std::sync::Arc;

use crate::common::i18n::I18nStore;

// Extrator de idioma a partir do Accept-Language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
    Arc<I18nStore>: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let lang = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .and_then(|header_str| {
                accept_language::parse(header_str)
                    .first() // Idioma de maior peso (ex: "es-CO")
                    .map(|tag| {
                        // "es-CO" -> "es"
                        tag.split('-').next().unwrap_or(tag).to_lowercase()
                    })
            })
            // Sem cabeçalho legível: idioma padrão do catálogo (DEFAULT_LOCALE)
            .unwrap_or_else(|| Arc::<I18nStore>::from_ref(state).default_lang().to_string());

        Ok(Locale(lang))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract_with_default(header: Option<&str>, default_lang: &str) -> Locale {
        let store = Arc::new(I18nStore::embedded(default_lang).unwrap());
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(header::ACCEPT_LANGUAGE, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Locale::from_request_parts(&mut parts, &store).await.unwrap()
    }

    async fn extract(header: Option<&str>) -> Locale {
        extract_with_default(header, "es").await
    }

    #[tokio::test]
    async fn test_primary_subtag_is_used() {
        assert_eq!(extract(Some("en-US,en;q=0.9")).await, Locale("en".into()));
    }

    #[tokio::test]
    async fn test_highest_weight_wins() {
        assert_eq!(extract(Some("en;q=0.5, es-CO;q=0.9")).await, Locale("es".into()));
    }

    #[tokio::test]
    async fn test_missing_header_defaults_to_spanish() {
        assert_eq!(extract(None).await, Locale("es".into()));
    }

    #[tokio::test]
    async fn test_missing_header_follows_configured_default() {
        assert_eq!(extract_with_default(None, "en").await, Locale("en".into()));
    }
}
