//! Error types for component hooks and unit lifecycle calls
//!
//! Policy rejections (duplicate type, duplicate instance, invalid capability
//! mix) are not errors; they surface as outcomes plus a diagnostic. The types
//! here only describe genuine failures that abort the current pass.

use std::fmt;
use thiserror::Error;

/// Failure raised by a component or unit hook
#[derive(Error, Debug)]
pub enum ComponentError {
    /// The hook needed its owner but the component is detached
    #[error("component has no owner")]
    MissingOwner,

    /// The component is in a state where the hook cannot run
    #[error("invalid component state: {0}")]
    State(String),

    /// Custom component error
    #[error("{0}")]
    Custom(String),
}

/// Lifecycle phase in which a component hook failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// `on_attach`
    Attach,
    /// `initialize`
    Initialize,
    /// `on_update`
    Update,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Attach => "attach",
            Self::Initialize => "initialize",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}

/// Errors returned by unit lifecycle calls
#[derive(Error, Debug)]
pub enum UnitError {
    /// A component hook failed; the enclosing pass was aborted
    #[error("component {component} failed during {phase}: {source}")]
    Component {
        /// Concrete type name of the failing component
        component: &'static str,
        /// Hook that failed
        phase: LifecyclePhase,
        /// Error returned by the hook
        #[source]
        source: ComponentError,
    },

    /// The unit-level initialization hook failed
    #[error("unit `{unit}` initialization hook failed: {source}")]
    Hook {
        /// Name of the unit
        unit: String,
        /// Error returned by the hook
        #[source]
        source: ComponentError,
    },

    /// The component was already borrowed when the unit needed it
    #[error("component {component} is already borrowed")]
    ComponentBusy {
        /// Concrete type name of the busy component
        component: &'static str,
    },
}

impl UnitError {
    pub(crate) fn component(
        component: &'static str,
        phase: LifecyclePhase,
        source: ComponentError,
    ) -> Self {
        Self::Component {
            component,
            phase,
            source,
        }
    }

    /// Lifecycle phase of a component failure, if this is one
    pub const fn phase(&self) -> Option<LifecyclePhase> {
        match self {
            Self::Component { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Result alias for unit lifecycle calls
pub type UnitResult<T> = Result<T, UnitError>;
