use std::collections::HashMap;

use crate::config::Target;
use crate::status::Status;

/// Last status recorded for a target. `Initial` marks a target that has not
/// been successfully classified yet and is distinct from every real status,
/// so the first observation can never fire a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastStatus {
    Initial,
    Known(Status),
}

/// A notification-worthy transition for one target.
///
/// `context` is free-form extra detail a channel may choose to render, such
/// as the fetched page's title; the detector itself never fills it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub target: String,
    pub url: String,
    pub previous: Status,
    pub current: Status,
    pub context: Option<String>,
}

/// In-memory map from target URL to its last observed status.
///
/// Lives for the duration of one monitor run; nothing is persisted across
/// restarts.
#[derive(Debug)]
pub struct StateStore {
    states: HashMap<String, LastStatus>,
}

impl StateStore {
    /// Creates a store with every target set to `LastStatus::Initial`.
    pub fn new<'a, I>(targets: I) -> Self
    where
        I: IntoIterator<Item = &'a Target>,
    {
        let states = targets
            .into_iter()
            .map(|target| (target.url.clone(), LastStatus::Initial))
            .collect();
        Self { states }
    }

    /// Records a freshly classified status for `target` and reports the
    /// transition, if any.
    ///
    /// The store is updated on every call, whether or not a change is
    /// returned. A change is only returned when the previous status was a
    /// real one (not `Initial`) and differs from `status`.
    pub fn observe(&mut self, target: &Target, status: Status) -> Option<StatusChange> {
        let previous = self
            .states
            .insert(target.url.clone(), LastStatus::Known(status));

        match previous {
            Some(LastStatus::Known(previous)) if previous != status => Some(StatusChange {
                target: target.name.clone(),
                url: target.url.clone(),
                previous,
                current: status,
                context: None,
            }),
            _ => None,
        }
    }

    /// Last recorded status for a URL, or `None` for an untracked URL.
    #[must_use]
    pub fn last(&self, url: &str) -> Option<LastStatus> {
        self.states.get(url).copied()
    }
}
