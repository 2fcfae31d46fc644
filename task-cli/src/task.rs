use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A single tracked unit of work.
#[derive(Debug, Eq, PartialEq, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Task {
    id: u32,
    description: String,
    status: Status,
    #[serde(with = "timestamp")]
    created_at: NaiveDateTime,
    #[serde(with = "timestamp")]
    updated_at: NaiveDateTime,
}

#[derive(Debug, Default, Eq, PartialEq, Serialize, Deserialize, Clone, Copy, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Done => "done",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Task {
    /// Creates a `todo` task whose both timestamps are `now`.
    pub fn new(id: u32, description: String, now: NaiveDateTime) -> Self {
        Self {
            id,
            description,
            status: Status::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    pub(crate) fn set_description(&mut self, description: String, now: NaiveDateTime) {
        self.description = description;
        self.updated_at = now;
    }

    pub(crate) fn set_status(&mut self, status: Status, now: NaiveDateTime) {
        self.status = status;
        self.updated_at = now;
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ID: {}, Description: {}, Status: {}, CreatedAt: {}, UpdatedAt: {}",
            self.id,
            self.description,
            self.status,
            self.created_at.format(timestamp::FORMAT),
            self.updated_at.format(timestamp::FORMAT),
        )
    }
}

/// Current local time at the precision the task file stores.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

/// Serde adapter for task timestamps: local time, microsecond precision, no offset.
pub(crate) mod timestamp {
    use chrono::{NaiveDateTime, SubsecRound};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    // Fractional seconds are optional on read; anything finer than microseconds is dropped.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<NaiveDateTime>()
            .map(|value| value.trunc_subsecs(6))
            .map_err(serde::de::Error::custom)
    }
}
