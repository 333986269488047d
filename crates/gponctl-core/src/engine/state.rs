// ── Per-OLT poll state ──

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::model::OltId;

/// Where one OLT's cycle currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollState {
    #[default]
    Idle,
    Polling,
    Reconciling,
    Failed { reason: String },
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Polling => f.write_str("polling"),
            Self::Reconciling => f.write_str("reconciling"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// One `watch` channel per OLT, created on first use.
#[derive(Debug, Default)]
pub(crate) struct PollStates {
    channels: DashMap<OltId, watch::Sender<PollState>>,
}

impl PollStates {
    pub(crate) fn set(&self, olt_id: OltId, state: PollState) {
        self.channels
            .entry(olt_id)
            .or_insert_with(|| watch::channel(PollState::Idle).0)
            .send_replace(state);
    }

    pub(crate) fn get(&self, olt_id: OltId) -> PollState {
        self.channels
            .get(&olt_id)
            .map(|tx| tx.borrow().clone())
            .unwrap_or_default()
    }

    pub(crate) fn subscribe(&self, olt_id: OltId) -> watch::Receiver<PollState> {
        self.channels
            .entry(olt_id)
            .or_insert_with(|| watch::channel(PollState::Idle).0)
            .subscribe()
    }
}

/// Returns the OLT to `Idle` when dropped, including when the cycle's
/// future is cancelled mid-flight.
pub(crate) struct IdleOnDrop<'a> {
    pub(crate) states: &'a PollStates,
    pub(crate) olt_id: OltId,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.states.set(self.olt_id, PollState::Idle);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_transitions() {
        let states = PollStates::default();
        let mut rx = states.subscribe(OltId(3));
        assert_eq!(*rx.borrow_and_update(), PollState::Idle);

        {
            let _idle = IdleOnDrop {
                states: &states,
                olt_id: OltId(3),
            };
            states.set(OltId(3), PollState::Polling);
            assert!(rx.has_changed().unwrap());
            assert_eq!(*rx.borrow_and_update(), PollState::Polling);
        }
        assert_eq!(states.get(OltId(3)), PollState::Idle);
        assert_eq!(states.get(OltId(99)), PollState::Idle);
    }

    #[test]
    fn display() {
        let failed = PollState::Failed {
            reason: "timeout".into(),
        };
        assert_eq!(failed.to_string(), "failed: timeout");
        assert_eq!(PollState::Reconciling.to_string(), "reconciling");
    }
}
