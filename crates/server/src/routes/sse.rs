//! Live event streaming for research sessions.
//!
//! A stream is: `connected`, replayed history after the client's cursor,
//! live events, synthetic `heartbeat` events while idle, and a final `done`
//! event after the pipeline's terminal event. Reconnection is cursor-based
//! (`Last-Event-ID` header or `?from=`): the client receives exactly the
//! persisted events with greater sequence numbers, in order, without gaps
//! or duplicates. A lagging subscriber is refilled from the log, so stage
//! events are never dropped; only heartbeats are connection-local.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use events::{EventKind, TraceEvent};
use futures::stream::Stream;
use futures::StreamExt;
use orchestrator::SessionEventLog;
use research_core::SessionStatus;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Last sequence number already seen; only later events are sent.
    pub from: Option<u64>,
}

fn to_sse_event(event: &TraceEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    let sse = Event::default().event(event.event.kind_str()).data(data);
    if event.sequence_no > 0 {
        sse.id(event.sequence_no.to_string())
    } else {
        sse
    }
}

struct TailState {
    log: Arc<SessionEventLog>,
    rx: broadcast::Receiver<TraceEvent>,
    pending: VecDeque<TraceEvent>,
    cursor: u64,
    terminal_seen: bool,
    done_sent: bool,
    heartbeat: Interval,
    session_id: Uuid,
}

/// Build the full event stream for one attached client.
pub fn tail_stream(
    log: Arc<SessionEventLog>,
    session_id: Uuid,
    status: SessionStatus,
    last_seen: u64,
) -> impl Stream<Item = TraceEvent> + Send {
    // Subscribe before reading history so no event can fall between the
    // two; the cursor filters the overlap.
    let rx = log.subscribe();

    let mut pending = VecDeque::new();
    pending.push_back(TraceEvent::synthetic(
        session_id,
        EventKind::Connected { status },
    ));
    pending.extend(log.events_after(last_seen));

    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = TailState {
        log,
        rx,
        pending,
        cursor: last_seen,
        terminal_seen: false,
        done_sent: false,
        heartbeat,
        session_id,
    };

    futures::stream::unfold(state, |mut s| async move {
        loop {
            while let Some(event) = s.pending.pop_front() {
                if event.sequence_no > 0 {
                    if event.sequence_no <= s.cursor {
                        continue;
                    }
                    s.cursor = event.sequence_no;
                }
                if event.event.is_terminal() {
                    s.terminal_seen = true;
                }
                return Some((event, s));
            }

            if s.terminal_seen {
                if s.done_sent {
                    return None;
                }
                s.done_sent = true;
                return Some((TraceEvent::synthetic(s.session_id, EventKind::Done), s));
            }

            tokio::select! {
                received = s.rx.recv() => match received {
                    Ok(event) => s.pending.push_back(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            session_id = %s.session_id,
                            skipped,
                            "Subscriber lagged, refilling from log"
                        );
                        s.pending.extend(s.log.events_after(s.cursor));
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let missed = s.log.events_after(s.cursor);
                        if missed.is_empty() {
                            s.terminal_seen = true;
                        } else {
                            s.pending.extend(missed);
                        }
                    }
                },
                _ = s.heartbeat.tick() => {
                    return Some((TraceEvent::synthetic(s.session_id, EventKind::Heartbeat), s));
                }
            }
        }
    })
}

#[utoipa::path(
    get,
    path = "/api/research/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("from" = Option<u64>, Query, description = "Last sequence number already seen"),
    ),
    responses(
        (status = 200, description = "SSE event stream"),
        (status = 404, description = "Session not found"),
    ),
    tag = "research"
)]
pub async fn research_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Unknown sessions fail before any stream is opened.
    let session = state.manager.status(id).await?;
    let log = state.manager.event_log(id).await;

    let last_seen = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .or(query.from)
        .unwrap_or(0);

    let stream = tail_stream(log, id, session.status, last_seen)
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    Ok(Sse::new(stream))
}
