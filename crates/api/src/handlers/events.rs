//! Server-sent room change stream.
//!
//! Each client gets a `ready` event followed by a `room_update` whenever
//! something in the room commits. Events carry no state; clients re-read
//! the room. A subscriber that falls behind the bus gets a single
//! `room_update` for the gap instead of the missed events.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use jigsaw_core::types::EntityId;
use jigsaw_events::RoomEvent;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::engine::load_room;
use crate::error::AppResult;
use crate::state::AppState;

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE_SECS: u64 = 15;

fn update_event(event: &RoomEvent) -> Event {
    Event::default()
        .event("room_update")
        .json_data(event)
        .unwrap_or_else(|_| Event::default().event("room_update").data(event.reason))
}

/// GET /api/v1/rooms/{id}/events
pub async fn room_events(
    State(state): State<AppState>,
    Path(room_id): Path<EntityId>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    load_room(&state.pool, room_id).await?;

    let receiver = state.event_bus.subscribe();
    tracing::debug!(
        room_id = %room_id,
        subscribers = state.event_bus.subscriber_count(),
        "Room event stream opened"
    );

    let ready = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("ready").data(room_id.to_string()))
    });

    let updates = BroadcastStream::new(receiver).filter_map(move |message| {
        let event = match message {
            Ok(event) if event.room_id == room_id => Some(update_event(&event)),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!(room_id = %room_id, missed, "Room event stream lagged");
                Some(update_event(&RoomEvent::new(room_id, "stream.lagged")))
            }
        };
        futures::future::ready(event.map(Ok))
    });

    Ok(Sse::new(ready.chain(updates))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS))))
}
