//! User lifecycle commands over any [`UserDirectory`].
//!
//! Every command returns an [`IamResult`]; directory errors never escape as
//! `Err`. Vendor error codes are classified through [`disposition_for`].

use super::profile::{AttributeMapper, IamAction, IamOutcome, IamResult, UserProfile, UserSnapshot};
use crate::traits::{ConnectorError, ConnectorResult, UserDirectory, VendorError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

pub const USER_DOES_NOT_EXIST: (&str, &str) = ("IAM_USER_DOES_NOT_EXIST", "User does not exist");
pub const USER_ALREADY_EXISTS: (&str, &str) = ("IAM_USER_ALREADY_EXISTS", "User already exists");
pub const COMMAND_DISABLED: &str = "Command is disabled.";

pub const USER_IS_DISABLED_ERROR: &str = "E0000007";
pub const USER_IS_DISABLED_MSG: &str = "Deactivation failed because the user is already disabled.";
pub const USER_ALREADY_ENABLED_ERROR: &str = "E0000016";
pub const RATE_LIMIT_ERROR: &str = "E0000047";

/// How a vendor error code is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The command had nothing to do.
    Skip,
    /// The command failed.
    Fail,
    /// The command failed and the host should raise it as an error.
    FailAndReport,
}

const VENDOR_DISPOSITIONS: &[(&str, Disposition)] = &[
    (USER_ALREADY_ENABLED_ERROR, Disposition::Skip),
    (USER_IS_DISABLED_ERROR, Disposition::Skip),
    // Rate limit resets after a minute
    (RATE_LIMIT_ERROR, Disposition::FailAndReport),
];

pub fn disposition_for(code: &str) -> Disposition {
    VENDOR_DISPOSITIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, d)| *d)
        .unwrap_or(Disposition::Fail)
}

/// Classifies a vendor error body.
pub fn dispatch_vendor_error(error: &VendorError) -> IamOutcome {
    let code = error.error_code.clone().unwrap_or_default();
    let message = if code == USER_IS_DISABLED_ERROR {
        USER_IS_DISABLED_MSG.to_string()
    } else {
        error.details()
    };

    match disposition_for(&code) {
        Disposition::Skip => IamOutcome::Skipped { reason: message },
        disposition => IamOutcome::Failed {
            code,
            message,
            return_error: disposition == Disposition::FailAndReport,
            details: Some(error.body.clone()),
        },
    }
}

/// Classifies any connector error.
pub fn outcome_for_error(error: &ConnectorError) -> IamOutcome {
    match error {
        ConnectorError::Vendor(vendor) => dispatch_vendor_error(vendor),
        ConnectorError::RateLimited(retry_after) => IamOutcome::Failed {
            code: RATE_LIMIT_ERROR.to_string(),
            message: format!("Rate limited, retry after {} seconds", retry_after),
            return_error: true,
            details: None,
        },
        other => IamOutcome::Failed {
            code: "transport".to_string(),
            message: other.to_string(),
            return_error: false,
            details: None,
        },
    }
}

/// Which commands are enabled and how missing users are handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    #[serde(default = "default_true")]
    pub create_user_enabled: bool,
    #[serde(default = "default_true")]
    pub enable_disable_enabled: bool,
    #[serde(default = "default_true")]
    pub update_user_enabled: bool,
    /// Create the user when an update or enable targets a missing user.
    #[serde(default)]
    pub create_if_not_exists: bool,
    /// Directory to platform attribute mapping.
    #[serde(default)]
    pub mapper_in: AttributeMapper,
    /// Platform to directory attribute mapping.
    #[serde(default)]
    pub mapper_out: AttributeMapper,
}

fn default_true() -> bool {
    true
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            create_user_enabled: true,
            enable_disable_enabled: true,
            update_user_enabled: true,
            create_if_not_exists: false,
            mapper_in: AttributeMapper::default(),
            mapper_out: AttributeMapper::default(),
        }
    }
}

/// Runs IAM commands against a directory.
pub struct UserLifecycle<D: UserDirectory> {
    directory: D,
    settings: LifecycleSettings,
}

impl<D: UserDirectory> UserLifecycle<D> {
    pub fn new(directory: D, settings: LifecycleSettings) -> Self {
        Self {
            directory,
            settings,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    fn finish(action: IamAction, profile: UserProfile, result: ConnectorResult<IamOutcome>) -> IamResult {
        let outcome = result.unwrap_or_else(|e| {
            warn!(%action, error = %e, "IAM command failed");
            outcome_for_error(&e)
        });
        IamResult {
            action,
            outcome,
            profile,
        }
    }

    fn login_of(profile: &UserProfile) -> ConnectorResult<String> {
        profile
            .email()
            .map(String::from)
            .ok_or_else(|| ConnectorError::InvalidRequest("User profile has no email".into()))
    }

    #[instrument(skip(self, profile))]
    pub async fn get_user(&self, mut profile: UserProfile) -> IamResult {
        let result: ConnectorResult<IamOutcome> = async {
            let login = Self::login_of(&profile)?;
            Ok(match self.directory.find_user_by_login(&login).await? {
                None => IamOutcome::Failed {
                    code: USER_DOES_NOT_EXIST.0.to_string(),
                    message: USER_DOES_NOT_EXIST.1.to_string(),
                    return_error: false,
                    details: None,
                },
                Some(user) => {
                    profile.update_with_directory_data(&user, &self.settings.mapper_in);
                    IamOutcome::Success(UserSnapshot::from_user(&user))
                }
            })
        }
        .await;
        Self::finish(IamAction::GetUser, profile, result)
    }

    #[instrument(skip(self, profile))]
    pub async fn create_user(&self, profile: UserProfile) -> IamResult {
        if !self.settings.create_user_enabled {
            return Self::finish(
                IamAction::CreateUser,
                profile,
                Ok(IamOutcome::skipped(COMMAND_DISABLED)),
            );
        }

        let result: ConnectorResult<IamOutcome> = async {
            let login = Self::login_of(&profile)?;
            if self.directory.find_user_by_login(&login).await?.is_some() {
                return Ok(IamOutcome::skipped(USER_ALREADY_EXISTS.1));
            }
            let created = self
                .directory
                .create_user(&self.settings.mapper_out.map_out(&profile))
                .await?;
            info!(user_id = %created.id, "User created");
            Ok(IamOutcome::Success(UserSnapshot::from_user(&created)))
        }
        .await;
        Self::finish(IamAction::CreateUser, profile, result)
    }

    #[instrument(skip(self, profile))]
    pub async fn update_user(&self, profile: UserProfile) -> IamResult {
        if !self.settings.update_user_enabled {
            return Self::finish(
                IamAction::UpdateUser,
                profile,
                Ok(IamOutcome::skipped(COMMAND_DISABLED)),
            );
        }

        let existing = match self.lookup(&profile).await {
            Ok(existing) => existing,
            Err(e) => return Self::finish(IamAction::UpdateUser, profile, Err(e)),
        };

        let Some(user) = existing else {
            return self.create_or_skip(IamAction::UpdateUser, profile).await;
        };

        let mut directory_profile = self.settings.mapper_out.map_out(&profile);
        for (attribute, value) in &user.profile {
            directory_profile
                .entry(attribute.clone())
                .or_insert_with(|| value.clone());
        }

        let result = self
            .directory
            .update_user(&user.id, &directory_profile)
            .await
            .map(|updated| {
                info!(user_id = %updated.id, "User updated");
                IamOutcome::Success(UserSnapshot::from_user(&updated))
            });
        Self::finish(IamAction::UpdateUser, profile, result)
    }

    #[instrument(skip(self, profile))]
    pub async fn enable_user(&self, profile: UserProfile) -> IamResult {
        if !self.settings.enable_disable_enabled {
            return Self::finish(
                IamAction::EnableUser,
                profile,
                Ok(IamOutcome::skipped(COMMAND_DISABLED)),
            );
        }

        let existing = match self.lookup(&profile).await {
            Ok(existing) => existing,
            Err(e) => return Self::finish(IamAction::EnableUser, profile, Err(e)),
        };

        let Some(user) = existing else {
            return self.create_or_skip(IamAction::EnableUser, profile).await;
        };

        let result = self.directory.activate_user(&user.id).await.map(|()| {
            info!(user_id = %user.id, "User enabled");
            IamOutcome::Success(UserSnapshot::with_active(&user, true))
        });
        Self::finish(IamAction::EnableUser, profile, result)
    }

    #[instrument(skip(self, profile))]
    pub async fn disable_user(&self, profile: UserProfile) -> IamResult {
        if !self.settings.enable_disable_enabled {
            return Self::finish(
                IamAction::DisableUser,
                profile,
                Ok(IamOutcome::skipped(COMMAND_DISABLED)),
            );
        }

        let result: ConnectorResult<IamOutcome> = async {
            match self.lookup(&profile).await? {
                None => Ok(IamOutcome::skipped(USER_DOES_NOT_EXIST.1)),
                Some(user) => {
                    self.directory.deactivate_user(&user.id).await?;
                    info!(user_id = %user.id, "User disabled");
                    Ok(IamOutcome::Success(UserSnapshot::with_active(&user, false)))
                }
            }
        }
        .await;
        Self::finish(IamAction::DisableUser, profile, result)
    }

    async fn lookup(
        &self,
        profile: &UserProfile,
    ) -> ConnectorResult<Option<crate::traits::DirectoryUser>> {
        let login = Self::login_of(profile)?;
        self.directory.find_user_by_login(&login).await
    }

    /// Missing user on update/enable: create it if configured, otherwise skip.
    async fn create_or_skip(&self, action: IamAction, profile: UserProfile) -> IamResult {
        if self.settings.create_if_not_exists {
            self.create_user(profile).await
        } else {
            Self::finish(
                action,
                profile,
                Ok(IamOutcome::skipped(USER_DOES_NOT_EXIST.1)),
            )
        }
    }
}
