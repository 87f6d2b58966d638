use chrono::NaiveDate;
use tracing::info;

use super::{Catalog, DailyTitleFormat, ResolveError, SessionRequest};
use crate::config::SessionConfig;

/// A session listed for today's daily rollover check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub part: Option<u32>,
}

/// Decides which session a new prompt belongs to.
///
/// Every call fetches a fresh session list; nothing is cached between calls.
#[derive(Debug)]
pub struct Resolver<'a, C> {
    catalog: &'a C,
    format: DailyTitleFormat,
    max_tokens: u64,
    max_messages: u64,
    today: Option<NaiveDate>,
}

impl<'a, C: Catalog> Resolver<'a, C> {
    /// # Errors
    /// Returns an error if the configured daily title format is invalid.
    pub fn new(catalog: &'a C, config: &SessionConfig) -> Result<Self, ResolveError> {
        Ok(Self {
            catalog,
            format: config.title_format()?,
            max_tokens: config.effective_max_tokens(),
            max_messages: config.effective_max_messages(),
            today: None,
        })
    }

    /// Pins "today" instead of reading the local clock.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Resolves `request` to a session id, creating a session when needed.
    ///
    /// # Errors
    /// Returns [`ResolveError::NoSessionConfigured`] for an empty request, or the
    /// catalog error unchanged. No retries are attempted.
    pub async fn resolve(&self, request: &str) -> Result<String, ResolveError> {
        match SessionRequest::parse(request)? {
            SessionRequest::Literal(target) => self.resolve_literal(&target).await,
            SessionRequest::Daily => self.resolve_daily().await,
        }
    }

    async fn resolve_literal(&self, target: &str) -> Result<String, ResolveError> {
        let sessions = self.catalog.list_sessions().await?;
        if let Some(existing) = sessions.into_iter().find(|s| s.id == target) {
            info!(session_id = %existing.id, "using existing session");
            return Ok(existing.id);
        }

        info!(title = target, "session not found, creating");
        Ok(self.catalog.create_session(target).await?)
    }

    async fn resolve_daily(&self) -> Result<String, ResolveError> {
        let today = self.today();
        let sessions = self.catalog.list_sessions().await?;

        let latest = sessions
            .into_iter()
            .filter_map(|s| {
                let part = self.format.part_of(&s.title, today)?;
                Some(SessionSummary {
                    id: s.id,
                    title: s.title,
                    part: Some(part),
                })
            })
            .max_by_key(|s| s.part);

        let Some(latest) = latest else {
            let title = self.format.render(today, 1);
            info!(title, "no daily session for today, creating part 1");
            return Ok(self.catalog.create_session(&title).await?);
        };

        if self.under_limits(&latest.id).await? {
            info!(session_id = %latest.id, title = %latest.title, "reusing daily session");
            return Ok(latest.id);
        }

        let next = latest.part.unwrap_or(0).saturating_add(1);
        let title = self.format.render(today, next);
        info!(previous = %latest.title, title, "daily session over limits, rolling over");
        Ok(self.catalog.create_session(&title).await?)
    }

    async fn under_limits(&self, session_id: &str) -> Result<bool, ResolveError> {
        let messages = self.catalog.list_messages(session_id).await?;
        let total_messages = messages.len() as u64;
        let total_tokens = messages
            .iter()
            .fold(0u64, |sum, m| sum.saturating_add(m.tokens.total()));

        Ok(total_tokens <= self.max_tokens && total_messages <= self.max_messages)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::client::{
        ClientError, ClientErrorKind, ClientResult, MessageSummary, SessionInfo, TokenUsage,
    };

    #[derive(Default)]
    struct FakeCatalog {
        sessions: Vec<SessionInfo>,
        messages: HashMap<String, Vec<MessageSummary>>,
        created: Mutex<Vec<String>>,
        fail_list: bool,
    }

    impl FakeCatalog {
        fn with_sessions(titles: &[(&str, &str)]) -> Self {
            Self {
                sessions: titles
                    .iter()
                    .map(|(id, title)| SessionInfo {
                        id: (*id).to_string(),
                        title: (*title).to_string(),
                    })
                    .collect(),
                ..Default::default()
            }
        }

        fn messages(mut self, session_id: &str, usage: &[(u64, u64)]) -> Self {
            let list = usage
                .iter()
                .enumerate()
                .map(|(i, (input, output))| MessageSummary {
                    id: format!("msg_{i}"),
                    tokens: TokenUsage {
                        input: *input,
                        output: *output,
                        reasoning: 0,
                    },
                })
                .collect();
            self.messages.insert(session_id.to_string(), list);
            self
        }

        fn created(&self) -> Vec<String> {
            self.created.lock().unwrap().clone()
        }
    }

    impl Catalog for FakeCatalog {
        async fn list_sessions(&self) -> ClientResult<Vec<SessionInfo>> {
            if self.fail_list {
                return Err(ClientError::new(ClientErrorKind::Connect, "down"));
            }
            Ok(self.sessions.clone())
        }

        async fn list_messages(&self, session_id: &str) -> ClientResult<Vec<MessageSummary>> {
            Ok(self.messages.get(session_id).cloned().unwrap_or_default())
        }

        async fn create_session(&self, title: &str) -> ClientResult<String> {
            let mut created = self.created.lock().unwrap();
            created.push(title.to_string());
            Ok(format!("new-{}", created.len()))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    fn limits(max_tokens: u64, max_messages: u64) -> SessionConfig {
        SessionConfig {
            daily_max_tokens: max_tokens,
            daily_max_messages: max_messages,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_request_is_an_error() {
        let catalog = FakeCatalog::default();
        let resolver = Resolver::new(&catalog, &SessionConfig::default()).unwrap();

        let err = resolver.resolve("").await.unwrap_err();
        assert!(matches!(err, ResolveError::NoSessionConfigured));
        assert!(catalog.created().is_empty());
    }

    #[tokio::test]
    async fn test_literal_matches_existing_id() {
        let catalog = FakeCatalog::with_sessions(&[("ses_a", "work")]);
        let resolver = Resolver::new(&catalog, &SessionConfig::default()).unwrap();

        assert_eq!(resolver.resolve("ses_a").await.unwrap(), "ses_a");
        assert!(catalog.created().is_empty());
    }

    #[tokio::test]
    async fn test_literal_creates_session_titled_after_request() {
        let catalog = FakeCatalog::with_sessions(&[("ses_a", "work")]);
        let resolver = Resolver::new(&catalog, &SessionConfig::default()).unwrap();

        // Titles are not ids.
        assert_eq!(resolver.resolve("work").await.unwrap(), "new-1");
        assert_eq!(catalog.created(), vec!["work"]);
    }

    #[tokio::test]
    async fn test_daily_creates_part_one_when_none_today() {
        let catalog = FakeCatalog::with_sessions(&[("old", "2025-01-01-daily-4")]);
        let resolver = Resolver::new(&catalog, &SessionConfig::default())
            .unwrap()
            .with_today(today());

        assert_eq!(resolver.resolve("daily").await.unwrap(), "new-1");
        assert_eq!(catalog.created(), vec!["2025-01-02-daily-1"]);
    }

    #[tokio::test]
    async fn test_daily_reuses_latest_part_under_limits() {
        let catalog = FakeCatalog::with_sessions(&[
            ("ses-1", "2025-01-02-daily-1"),
            ("ses-2", "2025-01-02-daily-2"),
        ])
        .messages("ses-2", &[(3, 4)]);
        let resolver = Resolver::new(&catalog, &limits(10, 10))
            .unwrap()
            .with_today(today());

        assert_eq!(resolver.resolve("daily").await.unwrap(), "ses-2");
        assert!(catalog.created().is_empty());
    }

    #[tokio::test]
    async fn test_daily_rolls_over_when_tokens_exceeded() {
        let catalog = FakeCatalog::with_sessions(&[("ses-3", "2025-01-02-daily-3")])
            .messages("ses-3", &[(8, 5)]);
        let resolver = Resolver::new(&catalog, &limits(10, 10))
            .unwrap()
            .with_today(today());

        assert_eq!(resolver.resolve("daily").await.unwrap(), "new-1");
        assert_eq!(catalog.created(), vec!["2025-01-02-daily-4"]);
    }

    #[tokio::test]
    async fn test_daily_rolls_over_when_messages_exceeded() {
        let catalog = FakeCatalog::with_sessions(&[("ses-1", "2025-01-02-daily-1")])
            .messages("ses-1", &[(1, 1), (1, 1), (1, 1)]);
        let resolver = Resolver::new(&catalog, &limits(1000, 2))
            .unwrap()
            .with_today(today());

        resolver.resolve("daily").await.unwrap();
        assert_eq!(catalog.created(), vec!["2025-01-02-daily-2"]);
    }

    #[tokio::test]
    async fn test_limits_are_inclusive() {
        let catalog = FakeCatalog::with_sessions(&[("ses-1", "2025-01-02-daily-1")])
            .messages("ses-1", &[(5, 5), (0, 0)]);
        let resolver = Resolver::new(&catalog, &limits(10, 2))
            .unwrap()
            .with_today(today());

        assert_eq!(resolver.resolve("daily").await.unwrap(), "ses-1");
    }

    #[tokio::test]
    async fn test_parts_ordered_numerically_and_malformed_ignored() {
        let catalog = FakeCatalog::with_sessions(&[
            ("ses-10", "2025-01-02-daily-10"),
            ("ses-9", "2025-01-02-daily-9"),
            ("bad", "2025-01-02-daily-x"),
            ("other", "2025-01-02-daily-2-notes"),
        ])
        .messages("ses-10", &[(u64::from(u32::MAX), 0)]);
        let resolver = Resolver::new(&catalog, &limits(100, 100))
            .unwrap()
            .with_today(today());

        resolver.resolve("daily").await.unwrap();
        assert_eq!(catalog.created(), vec!["2025-01-02-daily-11"]);
    }

    #[tokio::test]
    async fn test_zero_limits_use_defaults_not_unlimited() {
        let heavy: Vec<(u64, u64)> = vec![(200_000, 60_000)];
        let catalog = FakeCatalog::with_sessions(&[("ses-1", "2025-01-02-daily-1")])
            .messages("ses-1", &heavy);
        let resolver = Resolver::new(&catalog, &limits(0, 0))
            .unwrap()
            .with_today(today());

        resolver.resolve("daily").await.unwrap();
        assert_eq!(catalog.created(), vec!["2025-01-02-daily-2"]);
    }

    #[tokio::test]
    async fn test_catalog_errors_propagate_unchanged() {
        let catalog = FakeCatalog {
            fail_list: true,
            ..Default::default()
        };
        let resolver = Resolver::new(&catalog, &SessionConfig::default())
            .unwrap()
            .with_today(today());

        let err = resolver.resolve("daily").await.unwrap_err();
        let ResolveError::Client(client) = err else {
            panic!("expected client error");
        };
        assert_eq!(client.kind, ClientErrorKind::Connect);
        assert_eq!(client.message, "down");
    }
}
