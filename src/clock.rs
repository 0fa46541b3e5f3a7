use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::db::models::TIMESTAMP_FORMAT;

/// Which wall clock decides the calendar day for votes and listings.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Clock {
    #[default]
    Local,
    Utc,
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::Local => Local::now().naive_local(),
            Clock::Utc => Utc::now().naive_utc(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}
