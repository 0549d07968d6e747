// Device status derivation
//
// Folds a device's state events into its current online/offline status:
// - state: the state of the most recent event
// - since: birth date of the first event in the trailing run of that state
// - last_offline_reason: reason of the most recent offline event, if any
//
// Events are ordered by birth date with a stable sort, so events sharing a
// birth date keep the order the store returned them in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{DeviceState, ResolvedEvent};

/// Status reported for a device. Derived per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceStatus {
    #[serde(rename = "deviceID")]
    #[cfg_attr(feature = "openapi", schema(example = "mac:112233445566"))]
    pub device_id: String,
    pub state: DeviceState,
    /// When the device entered its current state
    pub since: DateTime<Utc>,
    /// When this status was derived
    pub now: DateTime<Utc>,
    /// Empty when no offline event was seen
    #[cfg_attr(feature = "openapi", schema(example = "ping miss"))]
    pub last_offline_reason: String,
}

impl DeviceStatus {
    pub fn new(device_id: impl Into<String>, snapshot: StatusSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            state: snapshot.state,
            since: snapshot.since,
            now,
            last_offline_reason: snapshot.last_offline_reason,
        }
    }
}

/// The event-derived part of a DeviceStatus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: DeviceState,
    pub since: DateTime<Utc>,
    pub last_offline_reason: String,
}

struct Transition<'a> {
    at: DateTime<Utc>,
    state: DeviceState,
    reason: Option<&'a str>,
}

/// Derive the status snapshot from a device's events.
///
/// Events without a state are ignored. Returns None when no event has one.
pub fn derive_status(events: &[ResolvedEvent]) -> Option<StatusSnapshot> {
    let mut timeline: Vec<Transition<'_>> = events
        .iter()
        .filter_map(|event| {
            event.state.map(|state| Transition {
                at: event.birth_date,
                state,
                reason: event.reason.as_deref(),
            })
        })
        .collect();
    timeline.sort_by_key(|transition| transition.at);

    let state = timeline.last()?.state;

    let since = timeline
        .iter()
        .rev()
        .take_while(|transition| transition.state == state)
        .last()?
        .at;

    let last_offline_reason = timeline
        .iter()
        .rev()
        .find(|transition| transition.state == DeviceState::Offline)
        .and_then(|transition| transition.reason)
        .unwrap_or_default()
        .to_string();

    Some(StatusSnapshot {
        state,
        since,
        last_offline_reason,
    })
}
