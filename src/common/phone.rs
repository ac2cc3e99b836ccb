// src/common/phone.rs

use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

// Plano de numeração nacional: código de discagem, tamanhos aceitos do
// número nacional e dígitos iniciais permitidos.
struct NumberingPlan {
    country: &'static str,
    dial_code: &'static str,
    lengths: &'static [usize],
    leading_digits: &'static str,
}

const PLANS: &[NumberingPlan] = &[
    NumberingPlan { country: "CO", dial_code: "57", lengths: &[10], leading_digits: "36" },
    NumberingPlan { country: "MX", dial_code: "52", lengths: &[10], leading_digits: "123456789" },
    NumberingPlan { country: "US", dial_code: "1", lengths: &[10], leading_digits: "23456789" },
    NumberingPlan { country: "CA", dial_code: "1", lengths: &[10], leading_digits: "23456789" },
    NumberingPlan { country: "BR", dial_code: "55", lengths: &[10, 11], leading_digits: "123456789" },
    NumberingPlan { country: "AR", dial_code: "54", lengths: &[10], leading_digits: "123456789" },
    NumberingPlan { country: "CL", dial_code: "56", lengths: &[9], leading_digits: "23456789" },
    NumberingPlan { country: "PE", dial_code: "51", lengths: &[8, 9], leading_digits: "123456789" },
    NumberingPlan { country: "EC", dial_code: "593", lengths: &[9], leading_digits: "2345679" },
    NumberingPlan { country: "ES", dial_code: "34", lengths: &[9], leading_digits: "6789" },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("país '{0}' não suportado")]
    UnsupportedCountry(String),
    #[error("o número contém caracteres inválidos")]
    InvalidCharacters,
    #[error("o número tem {0} dígitos")]
    InvalidLength(usize),
    #[error("o número começa com um dígito inválido")]
    InvalidPrefix,
    #[error("o código internacional não corresponde ao país")]
    CountryCodeMismatch,
}

/// Valida um telefone contra o plano do país (ISO 3166 alfa-2) e devolve o
/// número no formato E.164.
pub fn validate_phone(country: &str, number: &str) -> Result<String, PhoneError> {
    let plan = PLANS
        .iter()
        .find(|p| p.country.eq_ignore_ascii_case(country))
        .ok_or_else(|| PhoneError::UnsupportedCountry(country.to_string()))?;

    let compact: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let national = match compact.strip_prefix('+') {
        Some(international) => international
            .strip_prefix(plan.dial_code)
            .ok_or(PhoneError::CountryCodeMismatch)?,
        None => compact.as_str(),
    };

    if national.is_empty() || !national.chars().all(|c| c.is_ascii_digit()) {
        return Err(PhoneError::InvalidCharacters);
    }
    if !plan.lengths.contains(&national.len()) {
        return Err(PhoneError::InvalidLength(national.len()));
    }
    let first = national.chars().next().ok_or(PhoneError::InvalidCharacters)?;
    if !plan.leading_digits.contains(first) {
        return Err(PhoneError::InvalidPrefix);
    }

    Ok(format!("+{}{}", plan.dial_code, national))
}

/// Acumula o erro do telefone em `errors`, no formato usado pelos payloads.
pub fn validate_phone_field(
    errors: &mut ValidationErrors,
    field: &'static str,
    country: &str,
    number: &str,
) {
    if let Err(e) = validate_phone(country, number) {
        let message = match e {
            PhoneError::UnsupportedCountry(_) => "phone_country_unsupported",
            _ => "phone_invalid",
        };
        let mut err = ValidationError::new("phone");
        err.message = Some(message.into());
        errors.add(field, err);
    }
}

/// Normaliza um telefone já validado; cai para o texto original se não validar.
pub fn normalize_phone(country: &str, number: &str) -> String {
    validate_phone(country, number).unwrap_or_else(|_| number.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colombian_mobile_is_normalized() {
        assert_eq!(validate_phone("CO", "300 123 4567").unwrap(), "+573001234567");
        assert_eq!(validate_phone("co", "(300) 123-4567").unwrap(), "+573001234567");
    }

    #[test]
    fn test_international_prefix_must_match_country() {
        assert_eq!(validate_phone("CO", "+57 300 123 4567").unwrap(), "+573001234567");
        assert_eq!(
            validate_phone("CO", "+52 300 123 4567"),
            Err(PhoneError::CountryCodeMismatch)
        );
    }

    #[test]
    fn test_length_is_checked_per_country() {
        assert_eq!(validate_phone("CO", "30012345"), Err(PhoneError::InvalidLength(8)));
        assert!(validate_phone("BR", "11987654321").is_ok());
        assert!(validate_phone("BR", "1187654321").is_ok());
        assert!(validate_phone("ES", "612345678").is_ok());
    }

    #[test]
    fn test_leading_digit_is_checked() {
        assert_eq!(validate_phone("CO", "1001234567"), Err(PhoneError::InvalidPrefix));
        assert_eq!(validate_phone("ES", "512345678"), Err(PhoneError::InvalidPrefix));
    }

    #[test]
    fn test_rejects_letters_and_unknown_countries() {
        assert_eq!(validate_phone("CO", "300abc4567"), Err(PhoneError::InvalidCharacters));
        assert_eq!(validate_phone("CO", ""), Err(PhoneError::InvalidCharacters));
        assert_eq!(
            validate_phone("XX", "3001234567"),
            Err(PhoneError::UnsupportedCountry("XX".into()))
        );
    }

    #[test]
    fn test_field_errors_use_message_keys() {
        let mut errors = ValidationErrors::new();
        validate_phone_field(&mut errors, "phone", "CO", "123");
        validate_phone_field(&mut errors, "secondaryPhone", "ZZ", "3001234567");
        let fields = errors.field_errors();
        assert_eq!(fields["phone"][0].message.as_deref(), Some("phone_invalid"));
        assert_eq!(
            fields["secondaryPhone"][0].message.as_deref(),
            Some("phone_country_unsupported")
        );
    }
}
