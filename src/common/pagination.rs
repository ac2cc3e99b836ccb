// src/common/pagination.rs

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Tamanho fixo de página em todas as listagens.
pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Default, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Página, começando em 0
    #[serde(default)]
    pub page: u32,
}

pub fn offset(page: u32) -> i64 {
    i64::from(page) * PAGE_SIZE
}

/// Envelope de sucesso: `{ "error": false, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub error: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { error: false, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_uses_fixed_page_size() {
        assert_eq!(offset(0), 0);
        assert_eq!(offset(3), 30);
    }

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(Envelope::ok(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({ "error": false, "data": [1, 2] }));
    }

    #[test]
    fn test_page_defaults_to_zero() {
        let q: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.page, 0);
    }
}
