//! Boot disk handling: source resolution, in-place modification and
//! re-attachment on address change.

use crate::core::{
    domain::{
        error::{ProvisionResult, ValidationError},
        model::{
            resource::{TemplateConfig, TemplateState},
            server::{AttachStorageRequest, DetachStorageRequest},
            storage::{BackupRuleChange, ModifyStorageRequest},
            tracked::TemplateIdentity,
        },
    },
    infrastructure::server_api::ServerApi,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Moves the boot disk from one bus address to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reattach {
    pub from: String,
    pub to: String,
}

/// Actions converging the boot disk. Both may fire in one update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateChanges {
    pub modify: Option<ModifyStorageRequest>,
    pub reattach: Option<Reattach>,
}

impl TemplateChanges {
    /// Diffs the desired boot disk against what was last observed.
    ///
    /// `observed` is `None` when the last read did not find the boot disk
    /// among the server's devices; then only explicitly set fields count
    /// as changed and no re-attachment is planned.
    pub fn compute(
        identity: &TemplateIdentity,
        observed: Option<&TemplateState>,
        desired: &TemplateConfig,
    ) -> Self {
        let size_changed = desired
            .size
            .is_some_and(|size| observed.is_none_or(|o| o.size != size));
        let title_changed = desired
            .title
            .as_ref()
            .is_some_and(|title| observed.is_none_or(|o| &o.title != title));
        let backup_rule = match (&desired.backup_rule, &identity.backup_rule) {
            (Some(rule), _) => Some(BackupRuleChange::Set(rule.clone())),
            (None, Some(_)) => Some(BackupRuleChange::Clear),
            (None, None) => None,
        };
        let backup_changed = desired.backup_rule != identity.backup_rule;

        let modify = (size_changed || title_changed || backup_changed).then(|| {
            ModifyStorageRequest {
                uuid: identity.id.clone(),
                size: desired.size.or(observed.map(|o| o.size)).map(|s| s.get()),
                title: desired
                    .title
                    .as_ref()
                    .or(observed.map(|o| &o.title))
                    .map(|t| t.as_str().to_string()),
                backup_rule,
            }
        });

        let reattach = match (observed, desired.address.as_deref()) {
            (Some(observed), Some(address)) if observed.address != address => Some(Reattach {
                from: observed.address.clone(),
                to: address.to_string(),
            }),
            _ => None,
        };

        Self { modify, reattach }
    }

    pub fn is_empty(&self) -> bool {
        self.modify.is_none() && self.reattach.is_none()
    }
}

/// Applies `TemplateChanges` to a stopped server.
pub struct TemplateReconciler<'a> {
    api: &'a dyn ServerApi,
}

impl<'a> TemplateReconciler<'a> {
    pub fn new(api: &'a dyn ServerApi) -> Self {
        Self { api }
    }

    /// Resolves a template reference to a storage UUID.
    ///
    /// UUIDs pass through untouched; anything else must match the title of
    /// exactly one visible template.
    pub async fn resolve_source(&self, reference: &str) -> ProvisionResult<String> {
        if Uuid::parse_str(reference).is_ok() {
            return Ok(reference.to_string());
        }

        let templates = self.api.list_templates().await?;
        let mut matches = templates.iter().filter(|t| t.title == reference);
        match (matches.next(), matches.next()) {
            (Some(template), None) => {
                debug!(name = reference, uuid = %template.uuid, "Resolved template");
                Ok(template.uuid.clone())
            }
            (Some(_), Some(_)) => Err(ValidationError::field(
                "template.storage",
                format!("Template name '{}' is ambiguous, use its UUID", reference),
            )
            .into()),
            (None, _) => Err(ValidationError::field(
                "template.storage",
                format!("No template named '{}'", reference),
            )
            .into()),
        }
    }

    /// Modifies the boot disk, then re-attaches it when its address moved.
    pub async fn apply(
        &self,
        server_uuid: &str,
        identity: &TemplateIdentity,
        changes: &TemplateChanges,
    ) -> ProvisionResult<()> {
        if let Some(request) = &changes.modify {
            info!(storage = %request.uuid, "Modifying boot storage");
            self.api.modify_storage(request).await?;
        }

        if let Some(reattach) = &changes.reattach {
            info!(
                storage = %identity.id,
                from = %reattach.from,
                to = %reattach.to,
                "Re-attaching boot storage"
            );
            self.api
                .detach_storage(&DetachStorageRequest {
                    server_uuid: server_uuid.to_string(),
                    address: reattach.from.clone(),
                })
                .await?;
            self.api
                .attach_storage(&AttachStorageRequest {
                    server_uuid: server_uuid.to_string(),
                    address: reattach.to.clone(),
                    storage_uuid: identity.id.clone(),
                    device_type: None,
                })
                .await?;
        }

        Ok(())
    }
}
