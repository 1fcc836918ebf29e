use super::domain::Company;
use crate::marketplace::error::DirectoryError;

const HEADERS: [&str; 12] = [
    "id",
    "name",
    "category",
    "city",
    "contact_email",
    "phone",
    "website",
    "status",
    "web_validated",
    "logo_assigned",
    "assigned_agent",
    "created_at",
];

fn export_error(err: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::Export(err.to_string())
}

/// Render listings as CSV with a header row, in the order given.
pub(crate) fn companies_csv(companies: &[Company]) -> Result<String, DirectoryError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS).map_err(export_error)?;

    for company in companies {
        let created_at = company.created_at.to_rfc3339();
        writer
            .write_record([
                company.id.as_str(),
                company.name.as_str(),
                company.category.as_str(),
                company.city.as_str(),
                company.contact_email.as_str(),
                company.phone.as_str(),
                company.website.as_deref().unwrap_or(""),
                company.status.label(),
                if company.web_validated { "true" } else { "false" },
                if company.logo_assigned { "true" } else { "false" },
                company
                    .assigned_agent
                    .as_ref()
                    .map(|agent| agent.as_str())
                    .unwrap_or(""),
                created_at.as_str(),
            ])
            .map_err(export_error)?;
    }

    let bytes = writer.into_inner().map_err(export_error)?;
    String::from_utf8(bytes).map_err(export_error)
}
