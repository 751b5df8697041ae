use serde::{Serialize, Deserialize};

use crate::RunId;

/// Snapshot of a remote job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: RunId,
    pub state: RunState,
    pub run_page_url: String,
}

impl RunStatus {
    pub fn lifecycle_state(&self) -> &LifecycleState {
        &self.state.life_cycle_state
    }

    pub fn result_state(&self) -> Option<&ResultState> {
        self.state.result_state.as_ref()
    }

    pub fn status_url(&self) -> &str {
        &self.run_page_url
    }

    pub fn is_terminal(&self) -> bool {
        self.state.life_cycle_state.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub life_cycle_state: LifecycleState,
    #[serde(default)]
    pub result_state: Option<ResultState>,
    #[serde(default)]
    pub state_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
    Pending,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    Unknown(String),
}

impl LifecycleState {
    /// Whether the run will never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Terminated | LifecycleState::Skipped | LifecycleState::InternalError
        )
    }
}

impl From<String> for LifecycleState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => LifecycleState::Pending,
            "RUNNING" => LifecycleState::Running,
            "TERMINATING" => LifecycleState::Terminating,
            "TERMINATED" => LifecycleState::Terminated,
            "SKIPPED" => LifecycleState::Skipped,
            "INTERNAL_ERROR" => LifecycleState::InternalError,
            _ => LifecycleState::Unknown(value),
        }
    }
}

impl From<LifecycleState> for String {
    fn from(value: LifecycleState) -> Self {
        match value {
            LifecycleState::Pending => "PENDING".to_string(),
            LifecycleState::Running => "RUNNING".to_string(),
            LifecycleState::Terminating => "TERMINATING".to_string(),
            LifecycleState::Terminated => "TERMINATED".to_string(),
            LifecycleState::Skipped => "SKIPPED".to_string(),
            LifecycleState::InternalError => "INTERNAL_ERROR".to_string(),
            LifecycleState::Unknown(state) => state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultState {
    Success,
    Failed,
    TimedOut,
    Canceled,
    Unknown(String),
}

impl ResultState {
    pub fn is_success(&self) -> bool {
        *self == ResultState::Success
    }
}

impl From<String> for ResultState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SUCCESS" => ResultState::Success,
            "FAILED" => ResultState::Failed,
            "TIMEDOUT" => ResultState::TimedOut,
            "CANCELED" => ResultState::Canceled,
            _ => ResultState::Unknown(value),
        }
    }
}

impl From<ResultState> for String {
    fn from(value: ResultState) -> Self {
        match value {
            ResultState::Success => "SUCCESS".to_string(),
            ResultState::Failed => "FAILED".to_string(),
            ResultState::TimedOut => "TIMEDOUT".to_string(),
            ResultState::Canceled => "CANCELED".to_string(),
            ResultState::Unknown(state) => state,
        }
    }
}
