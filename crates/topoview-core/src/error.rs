pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Malformed {context} payload: {message}")]
    Decode {
        context: &'static str,
        message: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Invalid dashboard config: {message}")]
    Config { message: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl Error {
    pub(crate) fn decode(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            context,
            message: err.to_string(),
        }
    }
}

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{url}: HTTP status {status}")]
    Status { status: u16, url: String },

    #[error("{url}: unreachable: {message}")]
    Unreachable { url: String, message: String },

    #[error("{url}: malformed response: {message}")]
    Malformed { url: String, message: String },
}

/// Why the path selector refused a mutation. A refused call leaves the selection untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("no path selection mode is active")]
    NoMode,
    #[error("an exact path must start at one of its endpoints")]
    NotAnEndpoint,
    #[error("switch is already on the path")]
    Cycle,
    #[error("path already joins both endpoints")]
    PathClosed,
    #[error("switch is not linked to the end of the path")]
    NotAdjacent,
    #[error("path endpoints cannot be waypoints")]
    EndpointWaypoint,
    #[error("only one include switch may be selected")]
    IncludeTaken,
    #[error("switch is already selected")]
    AlreadySelected,
    #[error("switch is not in the topology")]
    UnknownNode,
    #[error("only the last switch of an exact path can be removed")]
    NotTail,
    #[error("switch is not selected")]
    NotSelected,
    #[error("exact path does not join both endpoints")]
    Incomplete,
}
