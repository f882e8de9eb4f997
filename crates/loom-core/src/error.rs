//! Runtime error types

use thiserror::Error;

use crate::kind::WidgetKind;

/// Errors raised when applying or driving behaviors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BehaviorError {
    /// No behavior registered under this id
    #[error("Unknown behavior: {0}")]
    UnknownBehavior(String),

    /// The owning component does not exist
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// The component's kind is not in the behavior's compatible types
    #[error("Behavior '{behavior}' cannot be applied to '{component}' of type '{kind}'")]
    Incompatible {
        /// Behavior id
        behavior: String,
        /// Component id
        component: String,
        /// Kind of the rejected component
        kind: WidgetKind,
    },

    /// No applied behavior under this id
    #[error("Unknown applied behavior: {0}")]
    UnknownApplication(String),
}

/// Specialized Result type for behavior operations
pub type BehaviorResult<T> = Result<T, BehaviorError>;

/// Errors raised by the runtime context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// No instance with this id
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// Neither the definition nor an attached behavior declares the point
    #[error("Component '{component}' has no connection point '{point}'")]
    UnknownPoint {
        /// Component id
        component: String,
        /// Point id
        point: String,
    },

    /// No definition registered for the kind
    #[error("Unknown component type: {0}")]
    UnknownType(WidgetKind),

    /// Re-entrant emission went deeper than the configured limit
    #[error("Emit depth {depth} exceeds maximum {max}")]
    EmitDepthExceeded {
        /// Depth reached
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// Behavior failure
    #[error(transparent)]
    Behavior(#[from] BehaviorError),
}

/// Specialized Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl RuntimeError {
    /// Create an unknown point error
    pub fn unknown_point(component: impl Into<String>, point: impl Into<String>) -> Self {
        Self::UnknownPoint {
            component: component.into(),
            point: point.into(),
        }
    }

    /// Missing targets are soft failures the caller may log and continue past
    pub fn is_missing_target(&self) -> bool {
        matches!(
            self,
            Self::UnknownComponent(_)
                | Self::UnknownPoint { .. }
                | Self::Behavior(BehaviorError::UnknownComponent(_))
        )
    }
}
