use x11rb::{
    errors::{ConnectError, ConnectionError, ReplyError},
    protocol::{
        ErrorKind,
        xproto::{
            CONFIGURE_WINDOW_REQUEST, COPY_AREA_REQUEST, GRAB_KEY_REQUEST,
            POLY_FILL_RECTANGLE_REQUEST, POLY_SEGMENT_REQUEST, POLY_TEXT8_REQUEST,
            SET_INPUT_FOCUS_REQUEST,
        },
    },
};

pub type Result<T, E = WmError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum WmError {
    #[error("cannot open display: {0}")]
    Connect(#[from] ConnectError),

    #[error("display connection lost: {0}")]
    Connection(#[from] ConnectionError),

    #[error("display request failed: {0}")]
    Reply(#[from] ReplyError),

    #[error("another window manager is already running")]
    AnotherWmRunning,

    #[error("cannot allocate color '{0}'")]
    ColorAllocation(String),

    #[error("invalid desktop index {0}")]
    InvalidDesktop(usize),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("event loop error: {0}")]
    EventLoop(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WmError {
    /// Whether the session cannot continue after this error.
    ///
    /// Protocol errors on a single request only affect that request; losing
    /// the connection or failing start-up ends the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            WmError::Reply(ReplyError::X11Error(_))
            | WmError::InvalidDesktop(_)
            | WmError::Spawn { .. } => false,
            WmError::Reply(ReplyError::ConnectionError(_))
            | WmError::Connect(_)
            | WmError::Connection(_)
            | WmError::AnotherWmRunning
            | WmError::ColorAllocation(_)
            | WmError::EventLoop(_)
            | WmError::Io(_) => true,
        }
    }
}

/// Errors that are expected while racing clients that disappear under us.
///
/// Any `BadWindow` is dropped. The remaining entries are the request/error
/// pairs a destroyed or reparented window can produce.
pub fn is_ignorable(kind: ErrorKind, request: u8) -> bool {
    match kind {
        ErrorKind::Window => true,
        ErrorKind::Match => matches!(request, SET_INPUT_FOCUS_REQUEST | CONFIGURE_WINDOW_REQUEST),
        ErrorKind::Drawable => matches!(
            request,
            POLY_TEXT8_REQUEST | POLY_FILL_RECTANGLE_REQUEST | POLY_SEGMENT_REQUEST | COPY_AREA_REQUEST
        ),
        ErrorKind::Access => request == GRAB_KEY_REQUEST,
        _ => false,
    }
}
