use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeStatus {
    PendingUpload,
    PendingPublic,
    Public,
    Deleted,
}

impl EpisodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::PendingUpload => "pending_upload",
            EpisodeStatus::PendingPublic => "pending_public",
            EpisodeStatus::Public => "public",
            EpisodeStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for EpisodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_upload" => Ok(EpisodeStatus::PendingUpload),
            "pending_public" => Ok(EpisodeStatus::PendingPublic),
            "public" => Ok(EpisodeStatus::Public),
            "deleted" => Ok(EpisodeStatus::Deleted),
            _ => Err(format!("Invalid episode status: {}", s)),
        }
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
