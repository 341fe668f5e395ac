use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Pipeline status of one item.
///
/// `Queued -> Processing -> Done | Error`. A `Processing` row that outlives
/// its pipeline is stale and only an explicit re-run moves it on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Queued,
    Processing,
    Done,
    Error,
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Done | AnalysisStatus::Error)
    }
}

impl Display for AnalysisStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AnalysisStatus::Queued => write!(f, "queued"),
            AnalysisStatus::Processing => write!(f, "processing"),
            AnalysisStatus::Done => write!(f, "done"),
            AnalysisStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(AnalysisStatus::Queued),
            "processing" => Ok(AnalysisStatus::Processing),
            "done" => Ok(AnalysisStatus::Done),
            "error" => Ok(AnalysisStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid analysis status: {}", s)),
        }
    }
}

/// Persisted status record, one per item. Overwritten, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub item_id: Uuid,
    pub status: AnalysisStatus,
    /// Set only for `Error`, and then names the failing step.
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisState {
    /// State of an item nobody has touched yet.
    pub fn queued(item_id: Uuid) -> Self {
        Self {
            item_id,
            status: AnalysisStatus::Queued,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn processing(item_id: Uuid) -> Self {
        Self {
            status: AnalysisStatus::Processing,
            ..Self::queued(item_id)
        }
    }

    pub fn done(item_id: Uuid) -> Self {
        Self {
            status: AnalysisStatus::Done,
            ..Self::queued(item_id)
        }
    }

    /// Terminal failure; the message is `failed at {step}: {error}`.
    pub fn failed(item_id: Uuid, step: &StepName, error: &str) -> Self {
        Self {
            status: AnalysisStatus::Error,
            last_error: Some(format!("failed at {}: {}", step, error)),
            ..Self::queued(item_id)
        }
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for AnalysisState {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(AnalysisState {
            item_id: row.try_get("item_id")?,
            status: row
                .try_get::<String, _>("status")?
                .parse()
                .map_err(|e| sqlx::Error::Decode(format!("Failed to parse status: {}", e).into()))?,
            last_error: row.try_get("error")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Name of one remote analysis operation, e.g. `audio` or `summary`.
///
/// Lower-case ASCII letters, digits, `-` and `_` only, so the name can be
/// embedded in an endpoint path and in `last_error` unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepName(String);

impl StepName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StepName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            anyhow::bail!("Step name cannot be empty");
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            anyhow::bail!("Invalid step name: {}", s);
        }
        Ok(StepName(name.to_string()))
    }
}

impl TryFrom<String> for StepName {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepName> for String {
    fn from(step: StepName) -> Self {
        step.0
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for StepName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            AnalysisStatus::Queued,
            AnalysisStatus::Processing,
            AnalysisStatus::Done,
            AnalysisStatus::Error,
        ] {
            assert_eq!(status.to_string().parse::<AnalysisStatus>().unwrap(), status);
        }
        assert!("running".parse::<AnalysisStatus>().is_err());
    }

    #[test]
    fn failed_state_names_the_step() {
        let step: StepName = "images".parse().unwrap();
        let state = AnalysisState::failed(Uuid::new_v4(), &step, "HTTP 502");
        assert_eq!(state.status, AnalysisStatus::Error);
        assert_eq!(state.last_error.as_deref(), Some("failed at images: HTTP 502"));
    }

    #[test]
    fn non_error_states_carry_no_error() {
        let id = Uuid::new_v4();
        assert!(AnalysisState::queued(id).last_error.is_none());
        assert!(AnalysisState::processing(id).last_error.is_none());
        assert!(AnalysisState::done(id).last_error.is_none());
        assert!(AnalysisState::done(id).status.is_terminal());
        assert!(!AnalysisState::processing(id).status.is_terminal());
    }

    #[test]
    fn step_name_validation() {
        assert_eq!("summary".parse::<StepName>().unwrap().as_str(), "summary");
        assert_eq!(" audio ".parse::<StepName>().unwrap().as_str(), "audio");
        assert!("".parse::<StepName>().is_err());
        assert!("Audio".parse::<StepName>().is_err());
        assert!("a/b".parse::<StepName>().is_err());
    }
}
