use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worksheet XML is malformed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Workbook archive is corrupt: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("{what} exceeds the limit of {limit}")]
    TooLarge { what: String, limit: usize },

    #[error("Worksheet not found in workbook: {0}")]
    MissingSheet(String),

    #[error("Source error: {source_name} - {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("Invalid meeting pattern '{pattern}': {reason}")]
    MeetingPattern { pattern: String, reason: String },

    #[error("Meeting pattern has no weekdays")]
    NoMeetingDays,

    #[error("Local time {time} does not exist in timezone {timezone}")]
    InvalidLocalTime {
        time: NaiveDateTime,
        timezone: String,
    },

    #[error("No courses found for {term} Term")]
    NoMatchingCourses { term: char },

    #[error("No scheduled meetings found for {term} Term")]
    NoScheduledCourses { term: char },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("ICS generation failed: {0}")]
    IcsGeneration(String),

    #[error("Network timeout")]
    Timeout,
}

impl Error {
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::MeetingPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
