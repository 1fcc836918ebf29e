use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::marketplace::accounts::UserId;
use crate::marketplace::store::{document_id, Document};
use crate::marketplace::validation::ValidationError;

document_id!(VehicleId, "veh");

const OLDEST_MODEL_YEAR: i32 = 1950;

/// A client's vehicle record (collection `vehiculos`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub owner_id: UserId,
    pub plate: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Document for Vehicle {
    const COLLECTION: &'static str = "vehiculos";

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleSubmission {
    #[serde(default, alias = "patente")]
    pub plate: String,
    #[serde(default, alias = "marca")]
    pub make: String,
    #[serde(default, alias = "modelo")]
    pub model: String,
    #[serde(default, alias = "anio")]
    pub year: i32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Checked vehicle fields ready to be stored.
pub(crate) struct VehicleFields {
    pub plate: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: Option<String>,
}

/// Uppercase the plate and drop spaces and dots; `None` when it is not plausible.
pub(crate) fn normalize_plate(raw: &str) -> Option<String> {
    let plate: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '.'))
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let significant = plate.chars().filter(char::is_ascii_alphanumeric).count();
    let well_formed = plate.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    (well_formed && (5..=8).contains(&significant)).then_some(plate)
}

impl VehicleSubmission {
    pub(crate) fn validate(self, now: DateTime<Utc>) -> Result<VehicleFields, ValidationError> {
        let mut errors = ValidationError::default();
        let plate = if self.plate.trim().is_empty() {
            errors.push("plate", "is required");
            String::new()
        } else {
            normalize_plate(&self.plate).unwrap_or_else(|| {
                errors.push("plate", "must have 5 to 8 letters or digits");
                String::new()
            })
        };
        let make = errors.required("make", &self.make);
        let model = errors.required("model", &self.model);

        let newest = now.year() + 1;
        if !(OLDEST_MODEL_YEAR..=newest).contains(&self.year) {
            errors.push(
                "year",
                format!("must be between {OLDEST_MODEL_YEAR} and {newest}"),
            );
        }
        errors.into_result()?;

        Ok(VehicleFields {
            plate,
            make,
            model,
            year: self.year,
            color: self
                .color
                .map(|color| color.trim().to_string())
                .filter(|color| !color.is_empty()),
        })
    }
}
