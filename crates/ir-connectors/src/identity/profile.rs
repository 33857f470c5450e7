//! Platform-neutral user profile and the typed results of IAM commands.

use crate::traits::{ConnectorError, ConnectorResult, DirectoryUser};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Vendor status of a user that has been deactivated.
pub const DEPROVISIONED_STATUS: &str = "DEPROVISIONED";

/// A user as the orchestration platform describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile {
    attributes: Map<String, Value>,
}

impl UserProfile {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    /// Parses a profile from a JSON object.
    pub fn from_json(json: &str) -> ConnectorResult<Self> {
        match serde_json::from_str(json) {
            Ok(Value::Object(attributes)) => Ok(Self { attributes }),
            Ok(_) => Err(ConnectorError::InvalidRequest(
                "User profile must be a JSON object".into(),
            )),
            Err(e) => Err(ConnectorError::InvalidRequest(format!(
                "Invalid user profile: {}",
                e
            ))),
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// The email attribute, which identifies the user in the directory.
    pub fn email(&self) -> Option<&str> {
        self.attributes.get("email").and_then(Value::as_str)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Copies the directory user's attributes into this profile, translated by `mapper_in`.
    pub fn update_with_directory_data(&mut self, user: &DirectoryUser, mapper_in: &AttributeMapper) {
        for (key, value) in mapper_in.map_in(&user.profile) {
            self.attributes.insert(key, value);
        }
    }
}

/// Translates attribute names between the platform and the directory.
///
/// Keys are platform attribute names, values are directory attribute names.
/// An empty mapper passes attributes through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMapper {
    fields: BTreeMap<String, String>,
}

impl AttributeMapper {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Platform profile to directory profile. Unmapped attributes are dropped.
    pub fn map_out(&self, profile: &UserProfile) -> Map<String, Value> {
        if self.fields.is_empty() {
            return profile.attributes.clone();
        }
        self.fields
            .iter()
            .filter_map(|(platform, directory)| {
                profile
                    .attributes
                    .get(platform)
                    .map(|v| (directory.clone(), v.clone()))
            })
            .collect()
    }

    /// Directory profile to platform attributes. Unmapped attributes are dropped.
    pub fn map_in(&self, directory_profile: &Map<String, Value>) -> Map<String, Value> {
        if self.fields.is_empty() {
            return directory_profile.clone();
        }
        self.fields
            .iter()
            .filter_map(|(platform, directory)| {
                directory_profile
                    .get(directory)
                    .map(|v| (platform.clone(), v.clone()))
            })
            .collect()
    }
}

/// The IAM command that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IamAction {
    GetUser,
    CreateUser,
    UpdateUser,
    EnableUser,
    DisableUser,
}

impl fmt::Display for IamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GetUser => "get",
            Self::CreateUser => "create",
            Self::UpdateUser => "update",
            Self::EnableUser => "enable",
            Self::DisableUser => "disable",
        };
        write!(f, "{}", s)
    }
}

/// What the directory reported about the user after a successful command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub active: bool,
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub details: Value,
}

impl UserSnapshot {
    /// Snapshot whose `active` flag follows the vendor status.
    pub fn from_user(user: &DirectoryUser) -> Self {
        Self::with_active(user, user.status.as_deref() != Some(DEPROVISIONED_STATUS))
    }

    pub fn with_active(user: &DirectoryUser, active: bool) -> Self {
        Self {
            active,
            id: user.id.clone(),
            email: user.email(),
            username: user.login(),
            details: user.raw.clone(),
        }
    }
}

/// Outcome of one IAM command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IamOutcome {
    Success(UserSnapshot),
    Skipped {
        reason: String,
    },
    Failed {
        code: String,
        message: String,
        /// Whether the host should surface this as an error entry.
        return_error: bool,
        details: Option<Value>,
    },
}

impl IamOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// An IAM command's action, outcome, and the profile it ended with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IamResult {
    pub action: IamAction,
    pub outcome: IamOutcome,
    pub profile: UserProfile,
}
