//! Identity provider connectors and the user lifecycle commands built on them.

pub mod lifecycle;
pub mod mock;
pub mod okta;
pub mod profile;

pub use lifecycle::{LifecycleSettings, UserLifecycle};
pub use mock::MockUserDirectory;
pub use okta::{OktaConfig, OktaConnector};
pub use profile::{AttributeMapper, IamAction, IamOutcome, IamResult, UserProfile, UserSnapshot};
