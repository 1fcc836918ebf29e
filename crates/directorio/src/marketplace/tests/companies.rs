use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::common::*;

use crate::marketplace::accounts::{AccountRegistration, Credentials, Role};
use crate::marketplace::companies::{
    Company, CompanyFilter, FlagUpdate, LegacyCompanyRecord, TransitionRequest,
};
use crate::marketplace::error::DirectoryError;
use crate::marketplace::media::ImageUpload;
use crate::marketplace::notifications::NoticeTopic;
use crate::marketplace::status::{ListingAction, ListingStatus};
use crate::marketplace::store::{Collection, MemoryCollection, RepositoryError};
use crate::marketplace::{
    FixedClock, Marketplace, MarketplaceSettings, MemoryMediaStore, MemoryNotifications, Stores,
};

#[test]
fn submission_starts_as_ingresada_with_clean_flags() {
    let h = harness();
    let owner = h.signup("duenio@taller.cl", Role::Company);

    let mut submission = company_submission("Taller Los Aromos", "Temuco");
    submission.contact_email = "  Contacto@Taller.CL ".to_string();
    let company = h
        .marketplace
        .companies
        .submit(&owner, submission)
        .expect("accepted");

    assert_eq!(company.status, ListingStatus::Submitted);
    assert!(!company.web_validated);
    assert!(!company.logo_assigned);
    assert_eq!(company.contact_email, "contacto@taller.cl");
    assert_eq!(company.phone, "+56987654321");
    assert_eq!(company.owner_id, owner.user_id);
    assert_eq!(company.version, 1);
}

#[test]
fn submission_reports_every_invalid_field() {
    let h = harness();
    let owner = h.signup("duenio@taller.cl", Role::Company);

    let mut submission = company_submission("", "");
    submission.contact_email = "sin-arroba".to_string();
    submission.phone = "12".to_string();
    submission.website = Some("taller.cl".to_string());

    match h.marketplace.companies.submit(&owner, submission) {
        Err(DirectoryError::Validation(errors)) => {
            for field in ["name", "city", "contact_email", "phone", "website"] {
                assert!(errors.has(field), "missing error for {field}: {errors}");
            }
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn concurrent_submissions_store_one_listing() {
    let h = harness();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let marketplace = h.marketplace.clone();
            let owner = owner.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                marketplace
                    .companies
                    .submit(&owner, company_submission("Taller Uno", "Temuco"))
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.join().expect("submitter thread") {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(err, DirectoryError::Duplicate(_)), "{err}"),
        }
    }
    assert_eq!(accepted, 1);

    let admin = h.admin();
    let stored = h
        .marketplace
        .companies
        .list(Some(&admin), &CompanyFilter::default())
        .expect("list");
    assert_eq!(stored.len(), 1);
}

#[test]
fn duplicate_name_in_same_city_conflicts_unless_rejected() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);

    let first = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller Los Aromos", "Temuco"))
        .expect("first");
    let err = h
        .marketplace
        .companies
        .submit(&owner, company_submission("taller los aromos", "TEMUCO"))
        .expect_err("duplicate");
    assert!(matches!(err, DirectoryError::Duplicate(_)));

    h.marketplace
        .companies
        .submit(&owner, company_submission("Taller Los Aromos", "Valdivia"))
        .expect("other city is fine");

    h.marketplace
        .companies
        .transition(
            &admin,
            &first.id,
            TransitionRequest {
                action: ListingAction::Reject,
                note: Some("datos incompletos".to_string()),
                expected_version: None,
            },
        )
        .expect("rejected");
    h.marketplace
        .companies
        .submit(&owner, company_submission("Taller Los Aromos", "Temuco"))
        .expect("rejected listing no longer blocks the name");
}

#[test]
fn clients_cannot_register_companies() {
    let h = harness();
    let client = h.signup("cliente@correo.cl", Role::Client);
    let err = h
        .marketplace
        .companies
        .submit(&client, company_submission("Taller", "Temuco"))
        .expect_err("forbidden");
    assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
}

#[test]
fn full_workflow_records_history_and_notifies_owner() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);

    let company = h.active_company(&owner, &admin, "Taller Los Aromos");
    assert_eq!(company.status, ListingStatus::Active);
    let path: Vec<_> = company.history.iter().map(|change| change.to).collect();
    assert_eq!(
        path,
        vec![
            ListingStatus::Validated,
            ListingStatus::UnderReview,
            ListingStatus::Active
        ]
    );
    assert!(company.history.iter().all(|change| change.actor == admin.user_id));

    let notices = h.notices.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].topic, NoticeTopic::CompanyApproved);
    assert_eq!(notices[0].recipient, owner.user_id);
}

#[test]
fn illegal_transition_is_rejected_without_writing() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let err = h
        .marketplace
        .companies
        .transition(
            &admin,
            &company.id,
            TransitionRequest {
                action: ListingAction::Approve,
                note: None,
                expected_version: None,
            },
        )
        .expect_err("cannot approve before review");
    assert!(matches!(err, DirectoryError::Transition(_)));

    let stored = h
        .marketplace
        .companies
        .profile(Some(&admin), &company.id)
        .expect("visible to admin")
        .company;
    assert_eq!(stored.version, company.version);
    assert!(stored.history.is_empty());
}

#[test]
fn rejection_requires_a_note() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let err = h
        .marketplace
        .companies
        .transition(
            &admin,
            &company.id,
            TransitionRequest {
                action: ListingAction::Reject,
                note: Some("   ".to_string()),
                expected_version: None,
            },
        )
        .expect_err("note required");
    assert!(matches!(err, DirectoryError::Validation(ref errors) if errors.has("note")));
}

#[test]
fn stale_version_loses_to_concurrent_admin() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");
    let read_version = company.version;

    h.marketplace
        .companies
        .transition(
            &admin,
            &company.id,
            TransitionRequest {
                action: ListingAction::Validate,
                note: None,
                expected_version: Some(read_version),
            },
        )
        .expect("first admin wins");

    let err = h
        .marketplace
        .companies
        .transition(
            &admin,
            &company.id,
            TransitionRequest {
                action: ListingAction::Reject,
                note: Some("duplicada".to_string()),
                expected_version: Some(read_version),
            },
        )
        .expect_err("second admin is stale");
    assert!(matches!(
        err,
        DirectoryError::Repository(RepositoryError::VersionMismatch { .. })
    ));
}

#[test]
fn approval_waits_for_web_validation_when_a_site_exists() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let mut submission = company_submission("Taller Web", "Temuco");
    submission.website = Some("https://taller.cl".to_string());
    let company = h
        .marketplace
        .companies
        .submit(&owner, submission)
        .expect("submitted");
    h.transition(&admin, &company.id, ListingAction::Validate);
    h.transition(&admin, &company.id, ListingAction::SendToReview);

    let approve = || {
        h.marketplace.companies.transition(
            &admin,
            &company.id,
            TransitionRequest {
                action: ListingAction::Approve,
                note: None,
                expected_version: None,
            },
        )
    };
    assert!(matches!(approve(), Err(DirectoryError::InvalidState(_))));

    h.marketplace
        .companies
        .set_flags(
            &admin,
            &company.id,
            FlagUpdate {
                web_validated: Some(true),
                ..FlagUpdate::default()
            },
        )
        .expect("flag set");
    assert_eq!(approve().expect("approved").status, ListingStatus::Active);
}

#[test]
fn flags_need_their_backing_data() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let err = h
        .marketplace
        .companies
        .set_flags(
            &admin,
            &company.id,
            FlagUpdate {
                web_validated: Some(true),
                logo_assigned: Some(true),
                expected_version: None,
            },
        )
        .expect_err("no website and no logo");
    match err {
        DirectoryError::Validation(errors) => {
            assert!(errors.has("web_validated"));
            assert!(errors.has("logo_assigned"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let owner_attempt = h.marketplace.companies.set_flags(
        &owner,
        &company.id,
        FlagUpdate::default(),
    );
    assert!(owner_attempt.is_err(), "owners cannot tick panel flags");
}

#[test]
fn uploading_a_logo_assigns_it_and_replaces_the_previous_one() {
    let h = harness();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let png = |bytes: &[u8]| ImageUpload {
        file_name: Some("logo.png".to_string()),
        content_type: Some("image/png".to_string()),
        bytes: bytes.to_vec(),
    };
    let first = h
        .marketplace
        .companies
        .upload_logo(&owner, &company.id, png(b"first"))
        .expect("uploaded");
    assert!(first.logo_assigned);
    let first_url = first.logo_url.clone().expect("url");

    let second = h
        .marketplace
        .companies
        .upload_logo(&owner, &company.id, png(b"second"))
        .expect("replaced");
    let second_url = second.logo_url.expect("url");
    assert_ne!(first_url, second_url);

    let old_key = first_url.trim_start_matches("/api/v1/media/");
    assert!(h.marketplace.media.fetch(old_key).expect("backend").is_none());
    let new_key = second_url.trim_start_matches("/api/v1/media/");
    assert_eq!(
        h.marketplace
            .media
            .fetch(new_key)
            .expect("backend")
            .expect("stored")
            .bytes,
        b"second"
    );
}

#[test]
fn listing_hides_pending_companies_from_the_public() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    h.active_company(&owner, &admin, "Taller Activo");
    h.marketplace
        .companies
        .submit(&owner, company_submission("Taller Pendiente", "Temuco"))
        .expect("submitted");

    let public = h
        .marketplace
        .companies
        .list(None, &CompanyFilter::default())
        .expect("list");
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].name, "Taller Activo");

    let as_owner = h
        .marketplace
        .companies
        .list(Some(&owner), &CompanyFilter::default())
        .expect("list");
    assert_eq!(as_owner.len(), 2);

    let pending = h
        .marketplace
        .companies
        .list(
            Some(&admin),
            &CompanyFilter {
                status: Some(ListingStatus::Submitted),
                ..CompanyFilter::default()
            },
        )
        .expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "Taller Pendiente");
}

#[test]
fn listing_search_folds_case_and_accents_and_sorts_newest_first() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    h.active_company(&owner, &admin, "Frenos Ñuble");
    h.clock.advance(chrono::Duration::minutes(5));
    h.active_company(&owner, &admin, "Mecánica Rápida");

    let all = h
        .marketplace
        .companies
        .list(None, &CompanyFilter::default())
        .expect("list");
    assert_eq!(all[0].name, "Mecánica Rápida");

    let found = h
        .marketplace
        .companies
        .list(
            None,
            &CompanyFilter {
                q: Some("RAPIDA".to_string()),
                ..CompanyFilter::default()
            },
        )
        .expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Mecánica Rápida");
}

#[test]
fn stats_count_each_status_and_flag() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    h.active_company(&owner, &admin, "Uno");
    let pending = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Dos", "Temuco"))
        .expect("submitted");
    h.transition(&admin, &pending.id, ListingAction::Validate);
    h.marketplace
        .companies
        .submit(&owner, company_submission("Tres", "Temuco"))
        .expect("submitted");

    let stats = h.marketplace.companies.stats(&admin).expect("stats");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.validated, 1);
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.unassigned, 3);

    assert!(h.marketplace.companies.stats(&owner).is_err());
}

#[test]
fn profile_of_hidden_company_is_not_found() {
    let h = harness();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let err = h
        .marketplace
        .companies
        .profile(None, &company.id)
        .expect_err("hidden");
    assert!(err.is_not_found());
    h.marketplace
        .companies
        .profile(Some(&owner), &company.id)
        .expect("owner sees own listing");
}

#[test]
fn delete_cascades_to_catalog() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let company = h.active_company(&owner, &admin, "Taller");
    let product = h
        .marketplace
        .catalog
        .submit_product(&owner, product_submission(&company.id))
        .expect("product");

    assert!(h.marketplace.companies.delete(&owner, &company.id).is_err());
    h.marketplace
        .companies
        .delete(&admin, &company.id)
        .expect("deleted");

    let err = h
        .marketplace
        .catalog
        .product_detail(Some(&admin), &product.id)
        .expect_err("product removed");
    assert!(err.is_not_found());
}

#[test]
fn export_writes_one_csv_row_per_company() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    h.active_company(&owner, &admin, "Taller, Sucursal Centro");

    let csv = h
        .marketplace
        .companies
        .export_csv(&admin, &CompanyFilter::default())
        .expect("export");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("id,"));
    assert!(lines[1].contains("\"Taller, Sucursal Centro\""));
    assert!(lines[1].contains("activa"));
}

#[test]
fn legacy_import_normalizes_statuses_and_reports_bad_records() {
    let h = harness();
    let admin = h.admin();

    let records: Vec<LegacyCompanyRecord> = serde_json::from_value(serde_json::json!([
        {
            "nombre": "Ferretería Sur",
            "rubro": "Ferretería",
            "correo": "VENTAS@SUR.CL",
            "telefono": "(45) 221 3344",
            "comuna": "Temuco",
            "sitio_web": "https://sur.cl",
            "webValidada": true,
            "estado": "Activo",
            "fecha_creacion": "2021-06-01"
        },
        { "nombre": "Sin Estado", "ciudad": "Temuco", "estado": "quizás" },
        { "ciudad": "Temuco" }
    ]))
    .expect("legacy payload parses");

    let summary = h
        .marketplace
        .companies
        .import_legacy(&admin, records)
        .expect("import runs");
    assert_eq!(summary.imported.len(), 1);
    assert_eq!(
        summary.skipped.iter().map(|issue| issue.index).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let imported = h
        .marketplace
        .companies
        .profile(None, &summary.imported[0])
        .expect("active import is public")
        .company;
    assert_eq!(imported.status, ListingStatus::Active);
    assert!(imported.web_validated);
    assert_eq!(imported.contact_email, "ventas@sur.cl");
    assert_eq!(imported.created_at.date_naive().to_string(), "2021-06-01");
}

/// Company store whose versioned writes always lose to a concurrent editor.
struct ContendedCompanies(MemoryCollection<Company>);

impl Collection<Company> for ContendedCompanies {
    fn insert(&self, document: Company) -> Result<Company, RepositoryError> {
        self.0.insert(document)
    }

    fn insert_unique(
        &self,
        document: Company,
        clashes: &dyn Fn(&Company) -> bool,
    ) -> Result<Company, RepositoryError> {
        self.0.insert_unique(document, clashes)
    }

    fn fetch(&self, id: &str) -> Result<Option<Company>, RepositoryError> {
        self.0.fetch(id)
    }

    fn update_unique(
        &self,
        document: Company,
        expected_version: u64,
        _clashes: &dyn Fn(&Company) -> bool,
    ) -> Result<Company, RepositoryError> {
        self.update(document, expected_version)
    }

    fn update(&self, document: Company, expected: u64) -> Result<Company, RepositoryError> {
        Err(RepositoryError::VersionMismatch {
            collection: "empresas",
            id: document.id.to_string(),
            expected,
            found: expected + 1,
        })
    }

    fn update_many(&self, documents: Vec<(Company, u64)>) -> Result<Vec<Company>, RepositoryError> {
        self.0.update_many(documents)
    }

    fn delete(&self, id: &str) -> Result<Company, RepositoryError> {
        self.0.delete(id)
    }

    fn scan(&self) -> Result<Vec<Company>, RepositoryError> {
        self.0.scan()
    }
}

#[test]
fn logo_is_discarded_when_the_listing_write_loses() {
    let media = MemoryMediaStore::default();
    let marketplace = Marketplace::new(
        Stores {
            companies: Arc::new(ContendedCompanies(MemoryCollection::default())),
            ..Stores::in_memory()
        },
        Arc::new(media.clone()),
        Arc::new(MemoryNotifications::default()),
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).single().expect("valid instant"),
        )),
        MarketplaceSettings::default(),
    );
    marketplace
        .accounts
        .register(AccountRegistration {
            email: "duenio@taller.cl".to_string(),
            display_name: "Dueña".to_string(),
            password: PASSWORD.to_string(),
            role: Role::Company,
        })
        .expect("registered");
    let session = marketplace
        .accounts
        .login(&Credentials {
            email: "duenio@taller.cl".to_string(),
            password: PASSWORD.to_string(),
        })
        .expect("login");
    let owner = marketplace.accounts.authenticate(&session.token).expect("actor");
    let company = marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let err = marketplace
        .companies
        .upload_logo(
            &owner,
            &company.id,
            ImageUpload {
                file_name: Some("logo.png".to_string()),
                content_type: Some("image/png".to_string()),
                bytes: b"png".to_vec(),
            },
        )
        .expect_err("listing changed underneath");
    assert!(matches!(
        err,
        DirectoryError::Repository(RepositoryError::VersionMismatch { .. })
    ));
    assert_eq!(media.object_count(), 0);
}
