use crate::ports::PairingService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use switchyard_core::{PairedUser, PairingStatus};
use tracing::info;

/// A freshly issued pairing request.
#[derive(Debug, Clone, Serialize)]
pub struct PairingRequest {
    /// Platform-specific user id.
    pub user_id: String,
    /// Platform name.
    pub platform: String,
    /// Display name, if known.
    pub username: Option<String>,
    /// Six-digit code an operator approves.
    pub otp: String,
    /// When the request was issued.
    pub created_at: DateTime<Utc>,
}

fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

type RecordKey = (String, String);

fn record_key(user_id: &str, platform: &str) -> RecordKey {
    (user_id.to_string(), platform.to_string())
}

/// In-process pairing records keyed by `(user_id, platform)`.
pub struct InMemoryPairingService {
    records: RwLock<HashMap<RecordKey, PairedUser>>,
    admin_id: Option<String>,
}

impl InMemoryPairingService {
    /// Creates an empty service with no admin.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            admin_id: None,
        }
    }

    /// Creates a service whose admin is approved on every listed platform.
    pub fn with_admin(admin_id: impl Into<String>, platforms: &[&str]) -> Self {
        let admin_id = admin_id.into();
        let service = Self {
            records: RwLock::new(HashMap::new()),
            admin_id: Some(admin_id.clone()),
        };
        for platform in platforms {
            service.pair(&admin_id, platform, Some("admin".to_string()));
            info!(admin_id = %admin_id, platform = %platform, "Admin bootstrapped into pairing records");
        }
        service
    }

    /// Upserts a pending record with a new one-time code.
    pub fn request_pairing(
        &self,
        user_id: &str,
        platform: &str,
        username: Option<String>,
    ) -> PairingRequest {
        let otp = generate_otp();
        let now = Utc::now();
        let mut records = self.records.write();
        let record = records
            .entry(record_key(user_id, platform))
            .or_insert_with(|| PairedUser {
                user_id: user_id.to_string(),
                platform: platform.to_string(),
                username: None,
                status: PairingStatus::Pending,
                otp: None,
                created_at: now,
                approved_at: None,
                revoked_at: None,
                last_seen_at: None,
            });
        record.status = PairingStatus::Pending;
        record.otp = Some(otp.clone());
        record.username = username.clone();
        info!(user_id = %user_id, platform = %platform, "Pairing request created");

        PairingRequest {
            user_id: user_id.to_string(),
            platform: platform.to_string(),
            username,
            otp,
            created_at: now,
        }
    }

    /// Approves the pending record holding `otp`. Returns whether one matched.
    pub fn approve_otp(&self, otp: &str) -> bool {
        let mut records = self.records.write();
        let pending = records.values_mut().find(|r| {
            r.status == PairingStatus::Pending && r.otp.as_deref() == Some(otp)
        });
        match pending {
            Some(record) => {
                record.status = PairingStatus::Approved;
                record.otp = None;
                record.approved_at = Some(Utc::now());
                info!(user_id = %record.user_id, platform = %record.platform, "Pairing approved via OTP");
                true
            }
            None => false,
        }
    }

    /// Approves a sender directly, creating the record if needed.
    pub fn pair(&self, user_id: &str, platform: &str, username: Option<String>) {
        let now = Utc::now();
        let mut records = self.records.write();
        let record = records
            .entry(record_key(user_id, platform))
            .or_insert_with(|| PairedUser {
                user_id: user_id.to_string(),
                platform: platform.to_string(),
                username: None,
                status: PairingStatus::Approved,
                otp: None,
                created_at: now,
                approved_at: None,
                revoked_at: None,
                last_seen_at: None,
            });
        record.status = PairingStatus::Approved;
        record.otp = None;
        record.approved_at = Some(now);
        if username.is_some() {
            record.username = username;
        }
    }

    /// Revokes a sender. Returns whether a record existed.
    pub fn revoke(&self, user_id: &str, platform: &str) -> bool {
        match self.records.write().get_mut(&record_key(user_id, platform)) {
            Some(record) => {
                record.status = PairingStatus::Revoked;
                record.revoked_at = Some(Utc::now());
                info!(user_id = %user_id, platform = %platform, "Pairing revoked");
                true
            }
            None => false,
        }
    }

    /// Whether `user_id` is the configured admin.
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_id.as_deref() == Some(user_id)
    }

    /// All records, ordered by platform then user id.
    pub fn list(&self) -> Vec<PairedUser> {
        let mut users: Vec<PairedUser> = self.records.read().values().cloned().collect();
        users.sort_by(|a, b| (&a.platform, &a.user_id).cmp(&(&b.platform, &b.user_id)));
        users
    }
}

impl Default for InMemoryPairingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PairingService for InMemoryPairingService {
    async fn paired_user(&self, user_id: &str, platform: &str) -> Option<PairedUser> {
        self.records
            .read()
            .get(&record_key(user_id, platform))
            .cloned()
    }

    async fn update_last_seen(&self, user_id: &str, platform: &str) {
        if let Some(record) = self.records.write().get_mut(&record_key(user_id, platform)) {
            record.last_seen_at = Some(Utc::now());
        }
    }
}
