//! Deterministic fault injection for exercising failure paths.

use std::collections::HashSet;
use std::sync::Mutex;

/// Points at which a flow consults the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    IncidentReceived,
    FinalizeReceived,
}

impl FaultPoint {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IncidentReceived => "incident_received",
            Self::FinalizeReceived => "finalize_received",
        }
    }
}

/// Decides whether a flow should fail at a given point.
///
/// Injected explicitly by the caller; nothing consults global state.
pub trait FaultInjector: Send + Sync {
    fn should_fail(&self, point: FaultPoint) -> bool;
}

/// Fails the next `n` visits to each armed point, then passes.
#[derive(Debug, Default)]
pub struct ScriptedFaults {
    remaining: Mutex<Vec<(FaultPoint, usize)>>,
    always: HashSet<FaultPoint>,
}

impl ScriptedFaults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` visits to `point`.
    #[must_use]
    pub fn fail_next(self, point: FaultPoint, times: usize) -> Self {
        if let Ok(mut remaining) = self.remaining.lock() {
            remaining.push((point, times));
        }
        self
    }

    /// Fail every visit to `point`.
    #[must_use]
    pub fn fail_always(mut self, point: FaultPoint) -> Self {
        self.always.insert(point);
        self
    }
}

impl FaultInjector for ScriptedFaults {
    fn should_fail(&self, point: FaultPoint) -> bool {
        if self.always.contains(&point) {
            return true;
        }
        let Ok(mut remaining) = self.remaining.lock() else {
            return false;
        };
        match remaining.iter_mut().find(|(p, n)| *p == point && *n > 0) {
            Some((_, n)) => {
                *n -= 1;
                true
            }
            None => false,
        }
    }
}
