//! Push device registration and outbound notices.
//!
//! Notices are handed to a [`NotificationPublisher`]; delivery to browsers or phones is the
//! publisher's concern. A failing publisher never undoes the operation that triggered it.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::accounts::{Actor, UserId};
use super::clock::Clock;
use super::error::DirectoryError;
use super::store::{document_id, Collection, Document};
use super::validation::ValidationError;

document_id!(DeviceId, "dev");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Android,
    Ios,
}

/// A push token registered by a signed-in user (collection `dispositivos`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRegistration {
    pub id: DeviceId,
    pub user_id: UserId,
    pub token: String,
    pub platform: Platform,
    pub registered_at: DateTime<Utc>,
    pub version: u64,
}

impl Document for DeviceRegistration {
    const COLLECTION: &'static str = "dispositivos";

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
pub struct DeviceRequest {
    pub token: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeTopic {
    CompanyApproved,
    CompanyRejected,
    ProductReviewed,
    CampaignReviewed,
    ClientRequestOpened,
    ClientRequestUpdated,
}

/// Message addressed to one user, fanned out to their registered devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub recipient: UserId,
    pub topic: NoticeTopic,
    pub subject_id: String,
    pub message: String,
    pub device_tokens: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: Notice) -> Result<(), NotificationError>;
}

/// Publisher that keeps every notice in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifications {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl MemoryNotifications {
    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notice: Notice) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .map_err(|_| NotificationError::Transport("notice log poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}

pub struct NotificationService {
    devices: Arc<dyn Collection<DeviceRegistration>>,
    publisher: Arc<dyn NotificationPublisher>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(
        devices: Arc<dyn Collection<DeviceRegistration>>,
        publisher: Arc<dyn NotificationPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            devices,
            publisher,
            clock,
        }
    }

    /// Register a push token for the caller. Re-registering a token is idempotent; a token
    /// seen under another user moves to the caller.
    pub fn register_device(
        &self,
        actor: &Actor,
        request: DeviceRequest,
    ) -> Result<DeviceRegistration, DirectoryError> {
        let token = request.token.trim().to_string();
        if token.is_empty() {
            return Err(ValidationError::single("token", "is required").into());
        }

        let existing = self
            .devices
            .scan()?
            .into_iter()
            .find(|device| device.token == token);

        match existing {
            Some(device) if device.user_id == actor.user_id && device.platform == request.platform => {
                Ok(device)
            }
            Some(mut device) => {
                let version = device.version;
                device.user_id = actor.user_id.clone();
                device.platform = request.platform;
                device.registered_at = self.clock.now();
                Ok(self.devices.update(device, version)?)
            }
            None => {
                let device = DeviceRegistration {
                    id: DeviceId::generate(),
                    user_id: actor.user_id.clone(),
                    token,
                    platform: request.platform,
                    registered_at: self.clock.now(),
                    version: 0,
                };
                Ok(self.devices.insert(device)?)
            }
        }
    }

    pub fn devices_for(&self, user: &UserId) -> Result<Vec<DeviceRegistration>, DirectoryError> {
        Ok(self
            .devices
            .scan()?
            .into_iter()
            .filter(|device| &device.user_id == user)
            .collect())
    }

    /// Best-effort notice; failures are logged and swallowed.
    pub(crate) fn notify(
        &self,
        recipient: &UserId,
        topic: NoticeTopic,
        subject_id: &str,
        message: String,
    ) {
        let device_tokens = match self.devices_for(recipient) {
            Ok(devices) => devices.into_iter().map(|device| device.token).collect(),
            Err(err) => {
                warn!(%recipient, error = %err, "device lookup failed");
                Vec::new()
            }
        };

        let notice = Notice {
            recipient: recipient.clone(),
            topic,
            subject_id: subject_id.to_string(),
            message,
            device_tokens,
            created_at: self.clock.now(),
        };

        match self.publisher.publish(notice) {
            Ok(()) => debug!(%recipient, ?topic, subject_id, "notice published"),
            Err(err) => warn!(%recipient, ?topic, error = %err, "notice dropped"),
        }
    }
}
