// src/handlers.rs

pub mod auth;
pub mod chat;
pub mod contracts;
pub mod products;
pub mod warehouses;

use rust_decimal::Decimal;
use validator::ValidationError;

// Colunas NUMERIC(…, 2)
const MAX_DECIMAL_PLACES: u32 = 2;

/// Áreas, alturas e valores precisam ser estritamente positivos.
pub(crate) fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("must_be_positive".into());
        return Err(err);
    }
    Ok(())
}

/// No máximo duas casas decimais; zeros à direita não contam.
pub(crate) fn validate_scale(val: &Decimal) -> Result<(), ValidationError> {
    if val.normalize().scale() > MAX_DECIMAL_PLACES {
        let mut err = ValidationError::new("scale");
        err.add_param("max".into(), &MAX_DECIMAL_PLACES);
        err.message = Some("too_many_decimals".into());
        return Err(err);
    }
    Ok(())
}

/// Medida ou valor monetário: positivo e com escala compatível com o banco.
pub(crate) fn validate_amount(val: &Decimal) -> Result<(), ValidationError> {
    validate_positive(val)?;
    validate_scale(val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_negative_are_rejected() {
        assert!(validate_positive(&Decimal::ZERO).is_err());
        assert!(validate_positive(&Decimal::new(-5, 1)).is_err());
        assert!(validate_positive(&Decimal::new(1, 2)).is_ok());
    }

    #[test]
    fn test_more_than_two_decimals_is_rejected() {
        let err = validate_scale(&Decimal::new(2555, 3)).unwrap_err();
        assert_eq!(err.message.as_deref(), Some("too_many_decimals"));
        assert!(validate_scale(&Decimal::new(255, 2)).is_ok());
        assert!(validate_scale(&Decimal::from(40)).is_ok());
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_decimals() {
        assert!(validate_scale(&Decimal::new(2500, 3)).is_ok());
    }

    #[test]
    fn test_amount_that_would_round_to_zero_is_rejected() {
        // 0.004 viraria 0.00 numa coluna de duas casas
        let err = validate_amount(&Decimal::new(4, 3)).unwrap_err();
        assert_eq!(err.message.as_deref(), Some("too_many_decimals"));
        assert!(validate_amount(&Decimal::new(255, 2)).is_ok());
        assert!(validate_amount(&Decimal::ZERO).is_err());
    }
}
