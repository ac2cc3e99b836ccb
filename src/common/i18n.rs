// src/common/i18n.rs

use anyhow::Context;
use std::collections::HashMap;

const EMBEDDED_LOCALES: [(&str, &str); 2] = [
    ("es", include_str!("../../locales/es.json")),
    ("en", include_str!("../../locales/en.json")),
];

/// Catálogo de mensagens por idioma, carregado uma vez no startup.
#[derive(Debug, Clone)]
pub struct I18nStore {
    default_lang: String,
    messages: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn embedded(default_lang: &str) -> anyhow::Result<Self> {
        let mut messages = HashMap::new();
        for (lang, raw) in EMBEDDED_LOCALES {
            let catalog: HashMap<String, String> = serde_json::from_str(raw)
                .with_context(|| format!("locale '{}' inválido", lang))?;
            messages.insert(lang.to_string(), catalog);
        }

        if !messages.contains_key(default_lang) {
            anyhow::bail!("idioma padrão '{}' não possui catálogo", default_lang);
        }

        Ok(Self {
            default_lang: default_lang.to_string(),
            messages,
        })
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    /// Idioma pedido -> idioma padrão -> a própria chave.
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.lookup(lang, key)
            .or_else(|| self.lookup(&self.default_lang, key))
            .unwrap_or(key)
            .to_string()
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<&str> {
        self.messages
            .get(lang)
            .and_then(|catalog| catalog.get(key))
            .map(String::as_str)
    }
}
