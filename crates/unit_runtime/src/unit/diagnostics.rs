//! Diagnostic journal
//!
//! Policy rejections are silent for the caller. Each one is logged through
//! the `log` facade and also kept in a small per-unit ring buffer so the
//! host can inspect what was refused after the fact.

use std::collections::VecDeque;
use std::fmt;

/// Why an attach request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// A component of the same concrete type is already registered
    DuplicateType,
    /// This exact instance is already registered
    DuplicateInstance,
    /// Host-managed components must not be update-capable
    UpdatableHostComponent,
    /// The unit has been torn down
    UnitDestroyed,
}

impl Rejection {
    /// Severity this rejection is reported with
    pub const fn severity(self) -> Severity {
        match self {
            Self::UpdatableHostComponent => Severity::Error,
            Self::DuplicateType | Self::DuplicateInstance | Self::UnitDestroyed => {
                Severity::Warning
            }
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::DuplicateType => "a component of this type is already attached",
            Self::DuplicateInstance => "this instance is already attached",
            Self::UpdatableHostComponent => {
                "host-managed components cannot be update-capable, they are ticked by the host"
            }
            Self::UnitDestroyed => "the unit has been torn down",
        };
        f.write_str(text)
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Misuse that left the unit unchanged
    Warning,
    /// Invalid component that was excluded from the unit
    Error,
}

/// Path through which a component reached the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachOrigin {
    /// Found on the backing object during discovery
    Discovery,
    /// Passed to `add_component`/`attach`
    Manual,
}

/// One recorded rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Why the component was refused
    pub rejection: Rejection,
    /// Concrete type name of the refused component
    pub component: &'static str,
    /// How the component reached the unit
    pub origin: AttachOrigin,
}

impl Diagnostic {
    /// Severity of the underlying rejection
    pub const fn severity(&self) -> Severity {
        self.rejection.severity()
    }
}

/// Bounded, oldest-first record of diagnostics
#[derive(Debug)]
pub struct DiagnosticJournal {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
}

impl DiagnosticJournal {
    /// Create a journal keeping at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Log a diagnostic for `unit` and keep it if there is room
    pub fn record(&mut self, unit: &str, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => log::warn!(
                "unit `{}`: rejected {} ({:?}): {}",
                unit,
                diagnostic.component,
                diagnostic.origin,
                diagnostic.rejection
            ),
            Severity::Error => log::error!(
                "unit `{}`: rejected {} ({:?}): {}",
                unit,
                diagnostic.component,
                diagnostic.origin,
                diagnostic.rejection
            ),
        }

        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(diagnostic);
    }

    /// Recorded diagnostics, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Number of recorded diagnostics with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity() == severity).count()
    }

    /// Number of recorded diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
