use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{ModerationFlag, NewModerationFlag};

#[async_trait]
pub trait ModerationRepository: Send + Sync {
    /// Appends an open flag. Returns `false` when an identical flag exists.
    async fn insert_flag(&self, flag: &NewModerationFlag) -> Result<bool, RepositoryError>;

    async fn list_for_object(&self, object_ref: &str) -> Result<Vec<ModerationFlag>, RepositoryError>;
}
