//! Error taxonomy for the client engine
//!
//! Build failures are local and constructive: nothing has been sent yet and
//! the caller has to fix the query or mutation. Everything that happens after
//! dispatch is reported per operation through its completion slot, which is
//! why every variant here is cheap to clone.

use std::time::Duration;

use thiserror::Error;

/// Failure raised while translating logical operations into a physical
/// request. Always surfaced before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The logical field is not defined on the model and no raw-name fallback
    /// was requested.
    #[error("field '{field}' is not defined on model '{model}'")]
    InvalidFieldReference { model: String, field: String },

    /// The operator has no token in the target dialect's grammar.
    #[error("operator '{operator}' cannot be rendered for the {dialect} dialect")]
    UnsupportedOperator { operator: String, dialect: String },

    /// The value kind has no rendering rule in the target dialect.
    #[error("no rendering rule for {kind} values in the {dialect} dialect")]
    UnsupportedValueType { kind: String, dialect: String },

    /// The operation kind (or its payload shape) cannot be expressed in the
    /// target protocol.
    #[error("{kind} operations cannot be dispatched over the {protocol} protocol")]
    UnsupportedOperation { kind: String, protocol: String },

    /// Two object-path nodes resolved to the same opaque identity name but
    /// with conflicting object types.
    #[error("object identity '{name}' is already registered with a different type")]
    DuplicateIdentity { name: String },

    /// A method or constructor parameter references an object-path id that is
    /// never emitted in the same physical request.
    #[error("parameter references object path id {id} which is not part of this request")]
    DanglingReference { id: i32 },

    /// A stateful-protocol mutation was submitted without the object identity
    /// it has to address.
    #[error("operation on model '{model}' requires an object identity")]
    MissingIdentity { model: String },

    /// Payload serialization failed (XML/JSON writer error).
    #[error("failed to serialize request: {0}")]
    Serialization(String),
}

/// Network-level failure. Surfaced to every operation in the affected
/// physical request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server kept throttling (429/503) and the retry budget ran out.
    #[error("throttled by the server, retry budget exhausted after {attempts} attempts")]
    ThrottleExhausted { attempts: u32 },

    #[error("failed to acquire an access token: {0}")]
    Auth(String),
}

/// A protocol assumption was violated while demultiplexing a response.
/// Defensive, never silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// The physical response carried fewer results than the manifest expects.
    #[error("response ended after {received} of {expected} expected results")]
    TruncatedResponse { expected: usize, received: usize },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Umbrella error resolved into an operation's completion slot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Server-reported fault embedded in a response element.
    #[error("server fault {code}: {message}")]
    Protocol { code: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The flush was cancelled before this operation produced a result.
    #[error("operation cancelled before completion")]
    Cancelled,

    /// The batch scope was dropped without ever being flushed.
    #[error("batch scope dropped before flush")]
    ScopeDropped,
}

impl ClientError {
    /// Server fault from a status code / message pair.
    pub fn protocol(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the error originated locally, before anything was sent.
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }
}
