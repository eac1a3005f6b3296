//! Domain models for storage operations.

use crate::core::domain::error::ValidationError;
use crate::core::domain::value_object::serde_helpers::string_or_number;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const MAX_BACKUP_RETENTION_DAYS: u32 = 1095;

/// How often a backup is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupInterval {
    Daily,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl BackupInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupInterval::Daily => "daily",
            BackupInterval::Mon => "mon",
            BackupInterval::Tue => "tue",
            BackupInterval::Wed => "wed",
            BackupInterval::Thu => "thu",
            BackupInterval::Fri => "fri",
            BackupInterval::Sat => "sat",
            BackupInterval::Sun => "sun",
        }
    }
}

impl fmt::Display for BackupInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "daily" => BackupInterval::Daily,
            "mon" => BackupInterval::Mon,
            "tue" => BackupInterval::Tue,
            "wed" => BackupInterval::Wed,
            "thu" => BackupInterval::Thu,
            "fri" => BackupInterval::Fri,
            "sat" => BackupInterval::Sat,
            "sun" => BackupInterval::Sun,
            other => {
                return Err(ValidationError::field(
                    "interval",
                    format!("'{}' must be daily or a weekday (mon..sun)", other),
                ));
            }
        })
    }
}

/// Automatic backup schedule of a storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct BackupRule {
    pub interval: BackupInterval,
    /// Time of day, `HHMM`.
    pub time: String,
    /// Days a backup is kept.
    #[serde(with = "string_or_number")]
    pub retention: u32,
}

impl BackupRule {
    pub fn new(
        interval: BackupInterval,
        time: impl Into<String>,
        retention: u32,
    ) -> Result<Self, ValidationError> {
        let rule = Self {
            interval,
            time: time.into(),
            retention,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_backup_time(&self.time)?;
        if !(1..=MAX_BACKUP_RETENTION_DAYS).contains(&self.retention) {
            return Err(ValidationError::field(
                "retention",
                format!(
                    "Retention must be between 1 and {} days",
                    MAX_BACKUP_RETENTION_DAYS
                ),
            ));
        }
        Ok(())
    }
}

fn validate_backup_time(time: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::Format(format!("Backup time '{}' must be HHMM", time));
    if time.len() != 4 || !time.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: u32 = time[..2].parse().map_err(|_| invalid())?;
    let minutes: u32 = time[2..].parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(())
}

/// A change to a storage's backup schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupRuleChange {
    Set(BackupRule),
    /// Removes the schedule; sent as an empty `backup_rule`.
    Clear,
}

/// Parameters for modifying a storage from `PUT /storage/{uuid}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifyStorageRequest {
    pub uuid: String,
    /// New size in gigabytes.
    pub size: Option<u32>,
    pub title: Option<String>,
    /// `None` leaves the schedule untouched.
    pub backup_rule: Option<BackupRuleChange>,
}

/// A storage as returned by the `/storage` endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageDetails {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, with = "string_or_number")]
    pub size: u32,
    /// `normal`, `template`, `backup` or `cdrom`.
    #[serde(rename = "type", default)]
    pub storage_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}
