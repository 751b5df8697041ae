use serde::{Serialize, Deserialize};
use std::fmt;

// RUNS

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i64);

impl RunId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RunId {
    fn from(id: i64) -> Self {
        RunId(id)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// CLUSTERS

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl AsRef<str> for ClusterId {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<String> for ClusterId {
    fn from(id: String) -> Self {
        ClusterId(id)
    }
}

impl From<&str> for ClusterId {
    fn from(id: &str) -> Self {
        ClusterId(id.to_owned())
    }
}
