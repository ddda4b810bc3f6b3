//! Process-local job store.

use std::collections::HashMap;

use async_trait::async_trait;
use talk_models::{
    ContentInsights, EmotionSample, GestureSample, Job, JobId, JobStatus, KeyMoment, NewJob,
    Report, TranscriptSegment, VideoStatus,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{assemble_report, ClearSummary, InsightMatch, JobStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct JobEntry {
    job: Job,
    emotions: Vec<EmotionSample>,
    gestures: Vec<GestureSample>,
    transcript: Vec<TranscriptSegment>,
    insights: Option<ContentInsights>,
    key_moments: Vec<KeyMoment>,
}

impl JobEntry {
    fn new(job: Job) -> Self {
        Self {
            job,
            emotions: Vec::new(),
            gestures: Vec::new(),
            transcript: Vec::new(),
            insights: None,
            key_moments: Vec::new(),
        }
    }
}

/// In-memory [`JobStore`] with the same ordering guarantees as the
/// PostgreSQL store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn with_entry<T>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut JobEntry) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        f(entry)
    }

    async fn matches(&self, filter: impl Fn(&ContentInsights) -> bool) -> Vec<(InsightMatch, Job)> {
        let jobs = self.jobs.read().await;
        jobs.values()
            .filter_map(|entry| {
                let insights = entry.insights.as_ref()?;
                (entry.job.status == JobStatus::Completed && filter(insights))
                    .then(|| (InsightMatch::new(&entry.job, insights), entry.job.clone()))
            })
            .collect()
    }
}

fn sort_by_time<T>(rows: &mut [T], key: impl Fn(&T) -> f64) {
    // Stable: rows with equal timestamps keep insertion order.
    rows.sort_by(|a, b| key(a).total_cmp(&key(b)));
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_job(&self, new: NewJob) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&new.id) {
            return Err(StoreError::AlreadyExists(new.id));
        }
        let job = Job::new(new);
        jobs.insert(job.id, JobEntry::new(job.clone()));
        debug!(job_id = %job.id, "Created job");
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).map(|e| e.job.clone()))
    }

    async fn list_jobs(&self, limit: u32, offset: u32) -> StoreResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().map(|e| e.job.clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: Option<u8>,
        error: Option<String>,
    ) -> StoreResult<Job> {
        self.with_entry(id, |entry| {
            entry.job.apply_update(status, progress, error)?;
            Ok(entry.job.clone())
        })
        .await
    }

    async fn update_video_status(&self, id: &JobId, status: VideoStatus) -> StoreResult<()> {
        self.with_entry(id, |entry| {
            entry.job.set_video_status(status);
            Ok(())
        })
        .await
    }

    async fn set_duration(&self, id: &JobId, seconds: f64) -> StoreResult<()> {
        self.with_entry(id, |entry| {
            entry.job.total_duration = Some(seconds);
            Ok(())
        })
        .await
    }

    async fn bulk_insert_emotions(&self, id: &JobId, rows: &[EmotionSample]) -> StoreResult<usize> {
        self.with_entry(id, |entry| {
            entry.emotions.extend_from_slice(rows);
            Ok(rows.len())
        })
        .await
    }

    async fn bulk_insert_gestures(&self, id: &JobId, rows: &[GestureSample]) -> StoreResult<usize> {
        self.with_entry(id, |entry| {
            entry.gestures.extend_from_slice(rows);
            Ok(rows.len())
        })
        .await
    }

    async fn bulk_insert_transcripts(
        &self,
        id: &JobId,
        rows: &[TranscriptSegment],
    ) -> StoreResult<usize> {
        self.with_entry(id, |entry| {
            let taken = rows.iter().find(|row| {
                entry
                    .transcript
                    .iter()
                    .any(|seg| seg.segment_index == row.segment_index)
            });
            if let Some(row) = taken {
                return Err(StoreError::corrupt(format!(
                    "duplicate transcript segment {} for job {id}",
                    row.segment_index
                )));
            }
            entry.transcript.extend_from_slice(rows);
            Ok(rows.len())
        })
        .await
    }

    async fn upsert_insights(&self, id: &JobId, insights: &ContentInsights) -> StoreResult<()> {
        self.with_entry(id, |entry| {
            entry.insights = Some(insights.clone());
            Ok(())
        })
        .await
    }

    async fn bulk_insert_key_moments(&self, id: &JobId, rows: &[KeyMoment]) -> StoreResult<usize> {
        self.with_entry(id, |entry| {
            entry.key_moments.extend_from_slice(rows);
            Ok(rows.len())
        })
        .await
    }

    async fn get_report(&self, id: &JobId) -> StoreResult<Option<Report>> {
        let jobs = self.jobs.read().await;
        let Some(entry) = jobs.get(id) else {
            return Ok(None);
        };

        let mut emotions = entry.emotions.clone();
        sort_by_time(&mut emotions, |e| e.timestamp);
        // Gestures keep insertion order.
        let gestures = entry.gestures.clone();
        let mut transcript = entry.transcript.clone();
        transcript.sort_by_key(|seg| seg.segment_index);
        let mut key_moments = entry.key_moments.clone();
        sort_by_time(&mut key_moments, |m| m.timestamp);

        Ok(Some(assemble_report(
            &entry.job,
            emotions,
            gestures,
            transcript,
            entry.insights.clone(),
            key_moments,
        )))
    }

    async fn delete_job(&self, id: &JobId) -> StoreResult<bool> {
        Ok(self.jobs.write().await.remove(id).is_some())
    }

    async fn search_by_topic(&self, topic: &str, limit: u32) -> StoreResult<Vec<InsightMatch>> {
        let mut found = self.matches(|i| i.has_topic(topic)).await;
        found.sort_by(|(_, a), (_, b)| b.completed_at.cmp(&a.completed_at).then(a.id.cmp(&b.id)));
        Ok(found
            .into_iter()
            .take(limit as usize)
            .map(|(m, _)| m)
            .collect())
    }

    async fn high_persuasion(&self, min_score: f64, limit: u32) -> StoreResult<Vec<InsightMatch>> {
        let mut found = self.matches(|i| i.persuasion_score >= min_score).await;
        found.sort_by(|(a, _), (b, _)| {
            b.persuasion_score
                .total_cmp(&a.persuasion_score)
                .then(a.job_id.cmp(&b.job_id))
        });
        Ok(found
            .into_iter()
            .take(limit as usize)
            .map(|(m, _)| m)
            .collect())
    }

    async fn clear_all(&self) -> StoreResult<ClearSummary> {
        let mut jobs = self.jobs.write().await;
        let count = |f: fn(&JobEntry) -> usize| jobs.values().map(f).sum::<usize>() as u64;

        let summary = ClearSummary {
            tables: vec![
                ("key_moments", count(|e| e.key_moments.len())),
                ("llm_insights", count(|e| usize::from(e.insights.is_some()))),
                ("transcripts", count(|e| e.transcript.len())),
                ("gestures", count(|e| e.gestures.len())),
                ("emotions", count(|e| e.emotions.len())),
                ("analyses", jobs.len() as u64),
                ("videos", jobs.len() as u64),
            ],
        };
        jobs.clear();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talk_models::{Emotion, GestureKind, KeyMomentKind};

    async fn store_with_job() -> (MemoryJobStore, JobId) {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        store
            .create_job(NewJob::new(id, "talk.mp4", format!("{id}_talk.mp4"), 2048))
            .await
            .unwrap();
        (store, id)
    }

    fn insights(topics: &[&str], score: f64) -> ContentInsights {
        ContentInsights {
            main_topics: topics.iter().map(|t| t.to_string()).collect(),
            persuasion_score: score,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, id) = store_with_job().await;
        let job = store.get_job(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.file_size, 2048);
        assert!(store.get_job(&JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let (store, id) = store_with_job().await;
        let err = store
            .create_job(NewJob::new(id, "again.mp4", "again.mp4", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_status_enforces_lifecycle() {
        let (store, id) = store_with_job().await;
        store
            .update_status(&id, JobStatus::Processing, Some(40), None)
            .await
            .unwrap();
        let err = store
            .update_status(&id, JobStatus::Processing, Some(30), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)));

        let job = store
            .update_status(&id, JobStatus::Completed, None, None)
            .await
            .unwrap();
        assert_eq!(job.progress, 100);
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let store = MemoryJobStore::new();
        let err = store
            .update_status(&JobId::new(), JobStatus::Processing, Some(10), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_report_orders_rows_by_time() {
        let (store, id) = store_with_job().await;
        store
            .bulk_insert_emotions(
                &id,
                &[
                    EmotionSample::new(3.0, Emotion::Happy, 0.9),
                    EmotionSample::new(1.0, Emotion::Serious, 0.8),
                    EmotionSample::new(1.0, Emotion::Hopeful, 0.8),
                ],
            )
            .await
            .unwrap();
        store
            .bulk_insert_gestures(
                &id,
                &[GestureSample::new(2.0, GestureKind::Pointing, "Point", 0.8)],
            )
            .await
            .unwrap();
        store.set_duration(&id, 3.0).await.unwrap();

        let report = store.get_report(&id).await.unwrap().unwrap();
        let times: Vec<f64> = report.emotions.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![1.0, 1.0, 3.0]);
        assert_eq!(report.emotions[0].emotion, Emotion::Serious);
        assert_eq!(report.summary.total_duration, 3.0);
        assert_eq!(report.summary.emotional_range.len(), 3);
        assert!(report.summary.top_themes.is_empty());
        assert!(report.video_path.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_everything() {
        let (store, id) = store_with_job().await;
        store
            .bulk_insert_key_moments(&id, &[KeyMoment::new(1.0, "x", KeyMomentKind::Gesture)])
            .await
            .unwrap();
        store
            .upsert_insights(&id, &insights(&["Energy"], 7.0))
            .await
            .unwrap();

        assert!(store.delete_job(&id).await.unwrap());
        assert!(store.get_report(&id).await.unwrap().is_none());
        assert!(store.search_by_topic("Energy", 10).await.unwrap().is_empty());
        assert!(!store.delete_job(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_segment_index_rejected() {
        let (store, id) = store_with_job().await;
        let seg = TranscriptSegment {
            segment_index: 0,
            start_time: 0.0,
            end_time: 1.0,
            text: "hi".into(),
            confidence: None,
        };
        store.bulk_insert_transcripts(&id, &[seg.clone()]).await.unwrap();
        assert!(store.bulk_insert_transcripts(&id, &[seg]).await.is_err());
    }

    #[tokio::test]
    async fn test_search_and_high_persuasion() {
        let store = MemoryJobStore::new();
        for (topics, score) in [(&["Climate", "Hope"][..], 9.0), (&["Finance"][..], 6.5)] {
            let id = JobId::new();
            store
                .create_job(NewJob::new(id, "a.mp4", format!("{id}_a.mp4"), 1))
                .await
                .unwrap();
            store
                .upsert_insights(&id, &insights(topics, score))
                .await
                .unwrap();
            store
                .update_status(&id, JobStatus::Completed, None, None)
                .await
                .unwrap();
        }

        let found = store.search_by_topic("climate", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].persuasion_score, 9.0);

        let top = store.high_persuasion(6.0, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].persuasion_score, 9.0);

        let top = store.high_persuasion(8.0, 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_search_skips_unfinished_analyses() {
        let store = MemoryJobStore::new();
        let mut ids = Vec::new();
        for status in [JobStatus::Failed, JobStatus::Processing, JobStatus::Completed] {
            let id = JobId::new();
            store
                .create_job(NewJob::new(id, "a.mp4", format!("{id}_a.mp4"), 1))
                .await
                .unwrap();
            store
                .upsert_insights(&id, &insights(&["Energy"], 9.0))
                .await
                .unwrap();
            let error = (status == JobStatus::Failed).then(|| "disk full".to_string());
            store
                .update_status(&id, status, Some(50), error)
                .await
                .unwrap();
            ids.push(id);
        }

        let found = store.search_by_topic("energy", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].job_id, ids[2]);

        let top = store.high_persuasion(8.0, 10).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].job_id, ids[2]);
    }

    #[tokio::test]
    async fn test_report_keeps_gesture_insertion_order() {
        let (store, id) = store_with_job().await;
        let gestures = vec![
            GestureSample::new(6.0, GestureKind::OpenArms, "Open", 0.9),
            GestureSample::new(2.0, GestureKind::Pointing, "Point", 0.8),
            GestureSample::new(4.0, GestureKind::HandRaise, "Raise", 0.85),
        ];
        store.bulk_insert_gestures(&id, &gestures).await.unwrap();

        let report = store.get_report(&id).await.unwrap().unwrap();
        assert_eq!(report.gestures, gestures);
    }

    #[tokio::test]
    async fn test_clear_all_counts_rows() {
        let (store, id) = store_with_job().await;
        store
            .bulk_insert_emotions(&id, &[EmotionSample::new(1.0, Emotion::Happy, 0.9)])
            .await
            .unwrap();
        let summary = store.clear_all().await.unwrap();
        assert_eq!(summary.total(), 3);
        assert!(store.is_empty().await);
    }
}
