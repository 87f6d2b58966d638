//! Session selection: literal sessions and the rolling daily session.

mod resolver;

use std::fmt;
use std::future::Future;

use chrono::NaiveDate;
pub use resolver::{Resolver, SessionSummary};

use crate::client::{ClientError, ClientResult, MessageSummary, SessionInfo};

/// Request value selecting the rolling daily session.
pub const DAILY: &str = "daily";

/// Catalog operations the resolver depends on.
pub trait Catalog {
    fn list_sessions(&self) -> impl Future<Output = ClientResult<Vec<SessionInfo>>> + Send;

    fn list_messages(
        &self,
        session_id: &str,
    ) -> impl Future<Output = ClientResult<Vec<MessageSummary>>> + Send;

    fn create_session(&self, title: &str) -> impl Future<Output = ClientResult<String>> + Send;
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    /// The rolling daily session.
    Daily,
    /// A session id, or the title for a new session.
    Literal(String),
}

impl SessionRequest {
    /// # Errors
    /// Returns [`ResolveError::NoSessionConfigured`] for an empty request.
    pub fn parse(request: &str) -> Result<Self, ResolveError> {
        match request.trim() {
            "" => Err(ResolveError::NoSessionConfigured),
            DAILY => Ok(SessionRequest::Daily),
            literal => Ok(SessionRequest::Literal(literal.to_string())),
        }
    }
}

/// Failure to resolve a session.
#[derive(Debug)]
pub enum ResolveError {
    NoSessionConfigured,
    InvalidTitleFormat(String),
    /// Catalog failure, carried unchanged.
    Client(ClientError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoSessionConfigured => write!(f, "No session configured"),
            ResolveError::InvalidTitleFormat(reason) => {
                write!(f, "Invalid daily title format: {reason}")
            }
            ResolveError::Client(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Client(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ClientError> for ResolveError {
    fn from(err: ClientError) -> Self {
        ResolveError::Client(err)
    }
}

/// Title pattern for daily sessions, e.g. `{date}-daily-{part}`.
///
/// `{date}` renders as `YYYY-MM-DD`; `{part}` is a positive integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTitleFormat {
    pattern: String,
}

impl DailyTitleFormat {
    pub const DATE_TOKEN: &str = "{date}";
    pub const PART_TOKEN: &str = "{part}";

    /// # Errors
    /// Returns an error unless the pattern has at least one `{date}` and exactly one `{part}`.
    pub fn parse(pattern: &str) -> Result<Self, ResolveError> {
        if !pattern.contains(Self::DATE_TOKEN) {
            return Err(ResolveError::InvalidTitleFormat(format!(
                "'{pattern}' must contain {}",
                Self::DATE_TOKEN
            )));
        }
        if pattern.matches(Self::PART_TOKEN).count() != 1 {
            return Err(ResolveError::InvalidTitleFormat(format!(
                "'{pattern}' must contain exactly one {}",
                Self::PART_TOKEN
            )));
        }
        Ok(Self {
            pattern: pattern.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn render(&self, date: NaiveDate, part: u32) -> String {
        self.with_date(date)
            .replacen(Self::PART_TOKEN, &part.to_string(), 1)
    }

    /// Returns the part number when `title` is a daily title for `date`.
    pub fn part_of(&self, title: &str, date: NaiveDate) -> Option<u32> {
        let dated = self.with_date(date);
        let (prefix, suffix) = dated.split_once(Self::PART_TOKEN)?;
        let digits = title.strip_prefix(prefix)?.strip_suffix(suffix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn with_date(&self, date: NaiveDate) -> String {
        self.pattern
            .replace(Self::DATE_TOKEN, &date.format("%Y-%m-%d").to_string())
    }
}

impl Default for DailyTitleFormat {
    fn default() -> Self {
        Self {
            pattern: "{date}-daily-{part}".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_request_parse() {
        assert!(matches!(
            SessionRequest::parse("  "),
            Err(ResolveError::NoSessionConfigured)
        ));
        assert_eq!(SessionRequest::parse("daily").unwrap(), SessionRequest::Daily);
        assert_eq!(
            SessionRequest::parse("ses_1").unwrap(),
            SessionRequest::Literal("ses_1".to_string())
        );
    }

    #[test]
    fn test_default_format_round_trip() {
        let format = DailyTitleFormat::default();
        let today = day(2025, 3, 9);

        assert_eq!(format.render(today, 1), "2025-03-09-daily-1");
        assert_eq!(format.part_of("2025-03-09-daily-12", today), Some(12));
    }

    #[test]
    fn test_part_of_rejects_other_dates_and_malformed_titles() {
        let format = DailyTitleFormat::default();
        let today = day(2025, 3, 9);

        assert_eq!(format.part_of("2025-03-08-daily-3", today), None);
        assert_eq!(format.part_of("2025-03-09-daily-", today), None);
        assert_eq!(format.part_of("2025-03-09-daily-x1", today), None);
        assert_eq!(format.part_of("2025-03-09-daily-+1", today), None);
        assert_eq!(format.part_of("notes", today), None);
    }

    #[test]
    fn test_custom_format() {
        let format = DailyTitleFormat::parse("journal {date} (part {part})").unwrap();
        let today = day(2024, 12, 31);

        assert_eq!(format.render(today, 2), "journal 2024-12-31 (part 2)");
        assert_eq!(format.part_of("journal 2024-12-31 (part 7)", today), Some(7));
        assert_eq!(format.part_of("journal 2024-12-31 (part 7", today), None);
    }

    #[test]
    fn test_invalid_formats() {
        assert!(DailyTitleFormat::parse("daily-{part}").is_err());
        assert!(DailyTitleFormat::parse("{date}-daily").is_err());
        assert!(DailyTitleFormat::parse("{date}-{part}-{part}").is_err());
    }
}
