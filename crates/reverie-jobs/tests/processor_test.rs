//! End-to-end state machine tests for the AI processor, using in-memory
//! repositories and the scripted mock backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use reverie_ai::mock::MockChatBackend;
use reverie_ai::AiErrorKind;
use reverie_core::{
    AiStatus, BatchInsight, CreateEntryRequest, Entry, EntryAnalysis, EntryRepository, Insight,
    InsightRepository, InsightType, Result, UpdateEntryRequest,
};
use reverie_jobs::{AiProcessor, InsightOutcome, ProcessOutcome};

// =============================================================================
// IN-MEMORY REPOSITORIES
// =============================================================================

#[derive(Default)]
struct MemEntriesInner {
    rows: HashMap<Uuid, Entry>,
    /// AI-field writes (processing transition, terminal writes, resets).
    ai_writes: usize,
}

#[derive(Clone, Default)]
struct MemEntries {
    inner: Arc<Mutex<MemEntriesInner>>,
}

impl MemEntries {
    fn get(&self, id: Uuid) -> Option<Entry> {
        self.inner.lock().unwrap().rows.get(&id).cloned()
    }

    fn ai_writes(&self) -> usize {
        self.inner.lock().unwrap().ai_writes
    }
}

#[async_trait]
impl EntryRepository for MemEntries {
    async fn insert(&self, owner_id: Uuid, req: CreateEntryRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let entry = Entry {
            id,
            owner_id,
            entry_date: req.entry_date.unwrap_or_else(|| now.date_naive()),
            content: req.content,
            mood: req.mood,
            ai_status: AiStatus::Pending,
            ai_summary: None,
            ai_sentiment: None,
            ai_themes: None,
            ai_error: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().rows.insert(id, entry);
        Ok(id)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Entry>> {
        Ok(self.get(id).filter(|e| e.owner_id == owner_id))
    }

    async fn list(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Entry>> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<Entry> = inner
            .rows
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.entry_date.cmp(&a.entry_date));
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_by_date_range(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Entry>> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<Entry> = inner
            .rows
            .values()
            .filter(|e| e.owner_id == owner_id && e.entry_date >= start && e.entry_date <= end)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.entry_date.cmp(&b.entry_date));
        Ok(entries)
    }

    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateEntryRequest) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(entry) = inner.rows.get_mut(&id).filter(|e| e.owner_id == owner_id) else {
            return Ok(false);
        };
        if let Some(content) = req.content {
            entry.content = content;
            entry.ai_status = AiStatus::Pending;
            entry.ai_summary = None;
            entry.ai_sentiment = None;
            entry.ai_themes = None;
            entry.ai_error = None;
        }
        if let Some(mood) = req.mood {
            entry.mood = Some(mood);
        }
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let matches = inner
            .rows
            .get(&id)
            .map(|e| e.owner_id == owner_id)
            .unwrap_or(false);
        if matches {
            inner.rows.remove(&id);
        }
        Ok(matches)
    }

    async fn begin_processing(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(entry) = inner.rows.get_mut(&id).filter(|e| e.owner_id == owner_id) else {
            return Ok(false);
        };
        if entry.ai_status != AiStatus::Pending {
            return Ok(false);
        }
        entry.ai_status = AiStatus::Processing;
        entry.updated_at = Utc::now();
        inner.ai_writes += 1;
        Ok(true)
    }

    async fn complete_analysis(
        &self,
        id: Uuid,
        owner_id: Uuid,
        analysis: &EntryAnalysis,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.rows.get_mut(&id).filter(|e| e.owner_id == owner_id) {
            entry.ai_status = AiStatus::Success;
            entry.ai_summary = Some(analysis.summary.clone());
            entry.ai_sentiment = Some(analysis.sentiment.clone());
            entry.ai_themes = Some(analysis.themes.clone());
            entry.ai_error = None;
            entry.updated_at = Utc::now();
            inner.ai_writes += 1;
        }
        Ok(())
    }

    async fn fail_analysis(&self, id: Uuid, owner_id: Uuid, user_message: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.rows.get_mut(&id).filter(|e| e.owner_id == owner_id) {
            entry.ai_status = AiStatus::Failed;
            entry.ai_summary = None;
            entry.ai_sentiment = None;
            entry.ai_themes = None;
            entry.ai_error = Some(user_message.to_string());
            entry.updated_at = Utc::now();
            inner.ai_writes += 1;
        }
        Ok(())
    }

    async fn reset_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        expected: &[AiStatus],
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(entry) = inner.rows.get_mut(&id).filter(|e| e.owner_id == owner_id) else {
            return Ok(false);
        };
        if !expected.contains(&entry.ai_status) {
            return Ok(false);
        }
        entry.ai_status = AiStatus::Pending;
        entry.ai_summary = None;
        entry.ai_sentiment = None;
        entry.ai_themes = None;
        entry.ai_error = None;
        entry.updated_at = Utc::now();
        inner.ai_writes += 1;
        Ok(true)
    }
}

#[derive(Default)]
struct MemInsightsInner {
    rows: HashMap<Uuid, Insight>,
    ai_writes: usize,
}

#[derive(Clone, Default)]
struct MemInsights {
    inner: Arc<Mutex<MemInsightsInner>>,
}

impl MemInsights {
    fn get(&self, id: Uuid) -> Option<Insight> {
        self.inner.lock().unwrap().rows.get(&id).cloned()
    }

    fn ai_writes(&self) -> usize {
        self.inner.lock().unwrap().ai_writes
    }

    fn row_count(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }
}

#[async_trait]
impl InsightRepository for MemInsights {
    async fn insert(
        &self,
        owner_id: Uuid,
        insight_type: InsightType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let insight = Insight {
            id,
            owner_id,
            insight_type,
            start_date,
            end_date,
            ai_status: AiStatus::Pending,
            content: None,
            themes: None,
            sentiment_trend: None,
            ai_error: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().rows.insert(id, insight);
        Ok(id)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Insight>> {
        Ok(self.get(id).filter(|i| i.owner_id == owner_id))
    }

    async fn list(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Insight>> {
        let inner = self.inner.lock().unwrap();
        let mut insights: Vec<Insight> = inner
            .rows
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        insights.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        insights.truncate(limit as usize);
        Ok(insights)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let matches = inner
            .rows
            .get(&id)
            .map(|i| i.owner_id == owner_id)
            .unwrap_or(false);
        if matches {
            inner.rows.remove(&id);
        }
        Ok(matches)
    }

    async fn begin_processing(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(insight) = inner.rows.get_mut(&id).filter(|i| i.owner_id == owner_id) else {
            return Ok(false);
        };
        if insight.ai_status != AiStatus::Pending {
            return Ok(false);
        }
        insight.ai_status = AiStatus::Processing;
        insight.updated_at = Utc::now();
        inner.ai_writes += 1;
        Ok(true)
    }

    async fn complete_insight(
        &self,
        id: Uuid,
        owner_id: Uuid,
        batch: &BatchInsight,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(insight) = inner.rows.get_mut(&id).filter(|i| i.owner_id == owner_id) {
            insight.ai_status = AiStatus::Success;
            insight.content = Some(batch.content.clone());
            insight.themes = Some(batch.themes.clone());
            insight.sentiment_trend = Some(batch.sentiment_trend.clone());
            insight.ai_error = None;
            insight.updated_at = Utc::now();
            inner.ai_writes += 1;
        }
        Ok(())
    }

    async fn fail_insight(&self, id: Uuid, owner_id: Uuid, user_message: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(insight) = inner.rows.get_mut(&id).filter(|i| i.owner_id == owner_id) {
            insight.ai_status = AiStatus::Failed;
            insight.content = None;
            insight.themes = None;
            insight.sentiment_trend = None;
            insight.ai_error = Some(user_message.to_string());
            insight.updated_at = Utc::now();
            inner.ai_writes += 1;
        }
        Ok(())
    }

    async fn reset_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        expected: &[AiStatus],
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(insight) = inner.rows.get_mut(&id).filter(|i| i.owner_id == owner_id) else {
            return Ok(false);
        };
        if !expected.contains(&insight.ai_status) {
            return Ok(false);
        }
        insight.ai_status = AiStatus::Pending;
        insight.content = None;
        insight.themes = None;
        insight.sentiment_trend = None;
        insight.ai_error = None;
        insight.updated_at = Utc::now();
        inner.ai_writes += 1;
        Ok(true)
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

const VALID_ANALYSIS: &str = r#"{
    "summary": "A productive day balancing work and rest.",
    "sentiment": {"score": 0.6, "label": "positive"},
    "themes": ["work", "growth"]
}"#;

const VALID_BATCH: &str = r#"{
    "reflection": "You kept a steady rhythm this week.",
    "themes": ["rhythm", "steadiness", "rest"],
    "sentimentAnalysis": {
        "overall": "Calm with a brighter finish.",
        "average": 0.3,
        "trajectory": "improving"
    }
}"#;

struct Harness {
    entries: MemEntries,
    insights: MemInsights,
    entry_backend: MockChatBackend,
    insight_backend: MockChatBackend,
    processor: AiProcessor,
    owner: Uuid,
}

fn harness(entry_backend: MockChatBackend, insight_backend: MockChatBackend) -> Harness {
    let entries = MemEntries::default();
    let insights = MemInsights::default();
    let processor = AiProcessor::new(
        Arc::new(entries.clone()),
        Arc::new(insights.clone()),
        Arc::new(entry_backend.clone()),
        Arc::new(insight_backend.clone()),
    );
    Harness {
        entries,
        insights,
        entry_backend,
        insight_backend,
        processor,
        owner: Uuid::now_v7(),
    }
}

async fn create_entry(h: &Harness, day: u32, content: &str) -> Uuid {
    h.entries
        .insert(
            h.owner,
            CreateEntryRequest {
                content: content.to_string(),
                mood: None,
                entry_date: NaiveDate::from_ymd_opt(2025, 6, day),
            },
        )
        .await
        .unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

// =============================================================================
// ENTRY PROCESSING
// =============================================================================

#[tokio::test]
async fn valid_entry_lands_in_success_with_exact_fields() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    let outcome = h.processor.process_entry(id, h.owner).await.unwrap();
    assert!(outcome.is_ok());

    let entry = h.entries.get(id).unwrap();
    assert_eq!(entry.ai_status, AiStatus::Success);
    assert_eq!(
        entry.ai_summary.as_deref(),
        Some("A productive day balancing work and rest.")
    );
    assert_eq!(entry.ai_sentiment.as_ref().unwrap().score, 0.6);
    assert_eq!(
        entry.ai_themes.as_deref(),
        Some(&["work".to_string(), "growth".to_string()][..])
    );
    assert!(entry.ai_error.is_none());
    assert!(entry.ai_fields_consistent());
    assert_eq!(
        h.entries.ai_writes(),
        2,
        "one processing write, one terminal write"
    );
}

#[tokio::test]
async fn provider_failure_lands_in_failed_with_user_message() {
    let h = harness(
        MockChatBackend::new().with_failure("OpenAI returned 429: Too Many Requests"),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    let outcome = h.processor.process_entry(id, h.owner).await.unwrap();
    let ProcessOutcome::Failed(classified) = outcome else {
        panic!("expected failed outcome");
    };
    assert_eq!(classified.kind, AiErrorKind::RateLimit);
    assert!(classified.retryable);

    let entry = h.entries.get(id).unwrap();
    assert_eq!(entry.ai_status, AiStatus::Failed);
    assert_eq!(entry.ai_error.as_deref(), Some(classified.user_message.as_str()));
    assert!(entry.ai_summary.is_none());
    assert!(entry.ai_fields_consistent());
}

#[tokio::test]
async fn short_content_fails_without_reaching_the_backend() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "short").await;

    let outcome = h.processor.process_entry(id, h.owner).await.unwrap();
    let ProcessOutcome::Failed(classified) = outcome else {
        panic!("expected failed outcome");
    };
    assert_eq!(classified.kind, AiErrorKind::ContentTooShort);
    assert!(!classified.retryable);
    assert_eq!(h.entry_backend.call_count(), 0);

    let entry = h.entries.get(id).unwrap();
    assert_eq!(entry.ai_status, AiStatus::Failed);
    assert!(entry.ai_fields_consistent());
}

#[tokio::test]
async fn untriggered_entry_stays_pending() {
    let h = harness(MockChatBackend::new(), MockChatBackend::new());
    let id = create_entry(&h, 1, "short").await;

    // Creation is phase 1 only; no trigger, no transition.
    let entry = h.entries.get(id).unwrap();
    assert_eq!(entry.ai_status, AiStatus::Pending);
    assert_eq!(h.entries.ai_writes(), 0);
}

#[tokio::test]
async fn missing_entry_reports_not_found_without_writes() {
    let h = harness(MockChatBackend::new(), MockChatBackend::new());

    let outcome = h
        .processor
        .process_entry(Uuid::now_v7(), h.owner)
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::NotFound));
    assert_eq!(h.entries.ai_writes(), 0);
}

#[tokio::test]
async fn entry_of_another_owner_is_not_found() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    let outcome = h
        .processor
        .process_entry(id, Uuid::now_v7())
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::NotFound));
}

#[tokio::test]
async fn terminal_entry_is_skipped_without_writes() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    h.processor.process_entry(id, h.owner).await.unwrap();
    let before = h.entries.get(id).unwrap();
    let writes_before = h.entries.ai_writes();

    let outcome = h.processor.process_entry(id, h.owner).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Skipped(AiStatus::Success)));

    let after = h.entries.get(id).unwrap();
    assert_eq!(h.entries.ai_writes(), writes_before, "no additional writes");
    assert_eq!(after.ai_summary, before.ai_summary);
    assert_eq!(after.ai_themes, before.ai_themes);
    assert_eq!(h.entry_backend.call_count(), 1, "job ran only once");
}

#[tokio::test]
async fn concurrent_processing_entry_is_skipped() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    // Another trigger already holds the processing transition.
    assert!(h.entries.begin_processing(id, h.owner).await.unwrap());

    let outcome = h.processor.process_entry(id, h.owner).await.unwrap();
    assert!(matches!(
        outcome,
        ProcessOutcome::Skipped(AiStatus::Processing)
    ));
    assert_eq!(h.entry_backend.call_count(), 0);
}

#[tokio::test]
async fn processing_transition_is_single_winner() {
    let h = harness(MockChatBackend::new(), MockChatBackend::new());
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    assert!(h.entries.begin_processing(id, h.owner).await.unwrap());
    assert!(!h.entries.begin_processing(id, h.owner).await.unwrap());
}

// =============================================================================
// RETRY / REGENERATE
// =============================================================================

#[tokio::test]
async fn retry_resets_failed_entry_and_reruns() {
    let backend = MockChatBackend::new()
        .with_response(VALID_ANALYSIS)
        .push_failure("request timed out");
    let h = harness(backend, MockChatBackend::new());
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    let first = h.processor.process_entry(id, h.owner).await.unwrap();
    assert!(matches!(first, ProcessOutcome::Failed(_)));
    assert_eq!(h.entries.get(id).unwrap().ai_status, AiStatus::Failed);

    let second = h.processor.retry_entry(id, h.owner).await.unwrap();
    assert!(second.is_ok());

    let entry = h.entries.get(id).unwrap();
    assert_eq!(entry.ai_status, AiStatus::Success);
    assert!(entry.ai_error.is_none(), "prior error cleared");
    assert_eq!(h.entry_backend.call_count(), 2);
}

#[tokio::test]
async fn retry_on_successful_entry_is_skipped() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;
    h.processor.process_entry(id, h.owner).await.unwrap();

    let outcome = h.processor.retry_entry(id, h.owner).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Skipped(AiStatus::Success)));
    assert_eq!(h.entry_backend.call_count(), 1);
}

#[tokio::test]
async fn regenerate_discards_old_output_and_reruns() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;
    h.processor.process_entry(id, h.owner).await.unwrap();

    let outcome = h.processor.regenerate_entry(id, h.owner).await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(h.entry_backend.call_count(), 2, "fresh job-runner invocation");

    let entry = h.entries.get(id).unwrap();
    assert_eq!(entry.ai_status, AiStatus::Success);
    assert!(entry.ai_fields_consistent());
}

#[tokio::test]
async fn retry_on_pending_entry_processes_directly() {
    let h = harness(
        MockChatBackend::new().with_response(VALID_ANALYSIS),
        MockChatBackend::new(),
    );
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    let outcome = h.processor.retry_entry(id, h.owner).await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(h.entry_backend.call_count(), 1);
}

// =============================================================================
// TIMEOUT CEILING
// =============================================================================

#[tokio::test(start_paused = true)]
async fn slow_provider_persists_a_timeout_failure() {
    let backend = MockChatBackend::new()
        .with_response(VALID_ANALYSIS)
        .with_latency(Duration::from_secs(31));
    let h = harness(backend, MockChatBackend::new());
    let id = create_entry(&h, 1, "Today was a good day. I felt happy and productive.").await;

    let outcome = h.processor.process_entry(id, h.owner).await.unwrap();
    let ProcessOutcome::Failed(classified) = outcome else {
        panic!("expected failed outcome");
    };
    assert_eq!(classified.kind, AiErrorKind::Timeout);
    assert!(classified.retryable);

    let entry = h.entries.get(id).unwrap();
    assert_eq!(entry.ai_status, AiStatus::Failed);
    assert!(entry.ai_error.as_deref().unwrap().contains("timed out"));
}

// =============================================================================
// INSIGHTS
// =============================================================================

#[tokio::test]
async fn insight_over_entries_lands_in_success() {
    let h = harness(
        MockChatBackend::new(),
        MockChatBackend::new().with_response(VALID_BATCH),
    );
    create_entry(&h, 1, "Slow start to the week, mostly errands.").await;
    create_entry(&h, 5, "Finished the project and went for a long walk.").await;

    let outcome = h
        .processor
        .generate_insight(h.owner, InsightType::Weekly, date(1), date(7))
        .await
        .unwrap();

    let InsightOutcome::Ok { insight_id } = outcome else {
        panic!("expected success");
    };
    let insight = h.insights.get(insight_id).unwrap();
    assert_eq!(insight.ai_status, AiStatus::Success);
    assert_eq!(
        insight.content.as_deref(),
        Some("You kept a steady rhythm this week.")
    );
    assert_eq!(insight.themes.as_ref().unwrap().len(), 3);
    assert!(insight.ai_fields_consistent());

    // The batch prompt carries each dated entry.
    let prompt = &h.insight_backend.calls()[0].prompt;
    assert!(prompt.contains("2025-06-01"));
    assert!(prompt.contains("Slow start to the week"));

    assert_eq!(
        h.insights.ai_writes(),
        2,
        "one processing write, one terminal write"
    );
}

#[tokio::test]
async fn empty_range_creates_no_insight_record() {
    let h = harness(
        MockChatBackend::new(),
        MockChatBackend::new().with_response(VALID_BATCH),
    );

    let outcome = h
        .processor
        .generate_insight(h.owner, InsightType::Weekly, date(1), date(7))
        .await
        .unwrap();

    let InsightOutcome::EmptyRange { start, end } = outcome else {
        panic!("expected empty range");
    };
    assert_eq!((start, end), (date(1), date(7)));
    assert_eq!(h.insights.row_count(), 0, "no record left behind");
    assert_eq!(h.insight_backend.call_count(), 0);
}

#[tokio::test]
async fn insight_provider_failure_is_persisted() {
    let h = harness(
        MockChatBackend::new(),
        MockChatBackend::new().with_failure("OpenAI returned 401: invalid api key"),
    );
    create_entry(&h, 2, "An ordinary day with a good lunch.").await;

    let outcome = h
        .processor
        .generate_insight(h.owner, InsightType::Weekly, date(1), date(7))
        .await
        .unwrap();

    let InsightOutcome::Failed {
        insight_id,
        classified,
    } = outcome
    else {
        panic!("expected failure");
    };
    assert_eq!(classified.kind, AiErrorKind::InvalidCredential);
    assert!(!classified.retryable);

    let insight = h.insights.get(insight_id).unwrap();
    assert_eq!(insight.ai_status, AiStatus::Failed);
    assert_eq!(
        insight.ai_error.as_deref(),
        Some(classified.user_message.as_str())
    );
    assert!(insight.ai_fields_consistent());
}

#[tokio::test]
async fn retry_reruns_failed_insight() {
    let backend = MockChatBackend::new()
        .with_response(VALID_BATCH)
        .push_failure("request timed out");
    let h = harness(MockChatBackend::new(), backend);
    create_entry(&h, 2, "An ordinary day with a good lunch.").await;

    let first = h
        .processor
        .generate_insight(h.owner, InsightType::Weekly, date(1), date(7))
        .await
        .unwrap();
    let InsightOutcome::Failed { insight_id, .. } = first else {
        panic!("expected failure");
    };

    let second = h.processor.retry_insight(insight_id, h.owner).await.unwrap();
    assert!(matches!(second, InsightOutcome::Ok { .. }));

    let insight = h.insights.get(insight_id).unwrap();
    assert_eq!(insight.ai_status, AiStatus::Success);
    assert!(insight.ai_error.is_none());
}

#[tokio::test]
async fn retry_on_emptied_range_marks_insight_failed() {
    let h = harness(
        MockChatBackend::new(),
        MockChatBackend::new().with_failure("request timed out"),
    );
    let entry_id = create_entry(&h, 2, "An ordinary day with a good lunch.").await;

    let first = h
        .processor
        .generate_insight(h.owner, InsightType::Weekly, date(1), date(7))
        .await
        .unwrap();
    let InsightOutcome::Failed { insight_id, .. } = first else {
        panic!("expected failure");
    };

    // The only entry in range disappears before the retry.
    assert!(h.entries.delete(entry_id, h.owner).await.unwrap());

    let outcome = h.processor.retry_insight(insight_id, h.owner).await.unwrap();
    assert!(matches!(outcome, InsightOutcome::EmptyRange { .. }));

    let insight = h.insights.get(insight_id).unwrap();
    assert_eq!(insight.ai_status, AiStatus::Failed);
    assert!(insight
        .ai_error
        .as_deref()
        .unwrap()
        .contains("No entries found between 2025-06-01 and 2025-06-07"));
    assert!(insight.ai_fields_consistent());
}

#[tokio::test]
async fn retry_missing_insight_reports_not_found() {
    let h = harness(MockChatBackend::new(), MockChatBackend::new());
    let outcome = h
        .processor
        .retry_insight(Uuid::now_v7(), h.owner)
        .await
        .unwrap();
    assert!(matches!(outcome, InsightOutcome::NotFound));
}
