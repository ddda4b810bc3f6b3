//! Server-sent progress events.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};

use talk_models::{JobId, ProgressEvent};
use talk_queue::ProgressStream;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// Stream a job's progress log as SSE `data: {"message", "index"}` events,
/// closed by a `DONE` event.
///
/// Connecting before the job exists is allowed; the stream waits for the
/// first message.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let job_id = JobId::parse(&analysis_id)?;
    metrics::record_progress_stream();

    let events = with_done_sentinel(state.progress.subscribe(job_id))
        .map(|event| Event::default().json_data(event));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Append a `DONE` event once the underlying log stream ends.
pub fn with_done_sentinel(events: ProgressStream) -> impl Stream<Item = ProgressEvent> + Send {
    stream::unfold(Some((events, 0usize)), |state| async move {
        let (mut events, delivered) = state?;
        match events.next().await {
            Some(event) => {
                let delivered = event.index + 1;
                Some((event, Some((events, delivered))))
            }
            None => Some((ProgressEvent::done(delivered), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use talk_models::DONE_MESSAGE;

    #[tokio::test]
    async fn test_done_follows_terminal_message() {
        let events: ProgressStream = Box::pin(stream::iter(vec![
            ProgressEvent::new(0, "📹 Uploading video: talk.mp4"),
            ProgressEvent::new(1, "✅ Analysis completed successfully!"),
        ]));

        let all: Vec<_> = with_done_sentinel(events).collect().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].message, DONE_MESSAGE);
        assert_eq!(all[2].index, 2);
    }

    #[tokio::test]
    async fn test_done_on_empty_stream() {
        let events: ProgressStream = Box::pin(stream::empty());
        let all: Vec<_> = with_done_sentinel(events).collect().await;
        assert_eq!(all, vec![ProgressEvent::done(0)]);
    }
}
