//! Field-level checks shared by the submission forms.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in a submission, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|error| error.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Record `field` as missing when `value` is blank; returns the trimmed value otherwise.
    pub(crate) fn required(&mut self, field: &'static str, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.push(field, "is required");
        }
        trimmed.to_string()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid submission: ")?;
        for (index, error) in self.fields.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

pub(crate) fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !email.chars().any(char::is_whitespace)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Digits of a phone number once formatting characters are removed, or `None` when the
/// remainder is not a plausible number.
pub(crate) fn normalize_phone(phone: &str) -> Option<String> {
    let mut digits = String::new();
    for (index, c) in phone.trim().chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if index == 0 => digits.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return None,
        }
    }
    let count = digits.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&count).then_some(digits)
}

pub(crate) fn is_valid_website(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if host.contains('.') && !host.starts_with('.') && !url.contains(' '))
}

/// Collapse whitespace, lowercase and drop Spanish accents. Used for duplicate detection and
/// free-text search.
pub(crate) fn fold(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' => 'a',
            'é' | 'è' => 'e',
            'í' => 'i',
            'ó' | 'ò' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_requires_local_part_and_dotted_domain() {
        assert!(is_valid_email("ventas@taller.cl"));
        assert!(!is_valid_email("ventas@taller"));
        assert!(!is_valid_email("@taller.cl"));
        assert!(!is_valid_email("ventas taller@taller.cl"));
    }

    #[test]
    fn phone_accepts_common_formatting() {
        assert_eq!(
            normalize_phone("+56 (9) 8765-4321").as_deref(),
            Some("+56987654321")
        );
        assert_eq!(normalize_phone("123"), None);
        assert_eq!(normalize_phone("22x345678"), None);
    }

    #[test]
    fn website_needs_scheme_and_host() {
        assert!(is_valid_website("https://taller.cl"));
        assert!(!is_valid_website("taller.cl"));
        assert!(!is_valid_website("https://localhost"));
    }

    #[test]
    fn fold_ignores_spacing_case_and_accents() {
        assert_eq!(fold("  Mecánica   RÁPIDA "), "mecanica rapida");
        assert_eq!(fold("Ñuble"), fold("nuble"));
    }

    #[test]
    fn display_lists_every_field() {
        let mut errors = ValidationError::default();
        errors.push("name", "is required");
        errors.push("phone", "must contain 7 to 15 digits");
        assert_eq!(
            errors.to_string(),
            "invalid submission: name is required; phone must contain 7 to 15 digits"
        );
    }
}
