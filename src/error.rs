use crate::loc::Loc;
use std::fmt::Display;
use thiserror::Error;

/// The kinds of failure the system distinguishes. Fatal kinds indicate that
/// the kernel's trust boundary was violated and are never caught by user
/// code; the rest propagate to the nearest expected-failure frame.
#[derive(Error, Debug, Clone)]
pub enum ErrorKind {
    #[error("type error: {0}")]
    Typing(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("no pattern matched {0}")]
    MatchFail(String),
    #[error("invalid term equality proof: {0}")]
    InvalidEqualTerm(String),
    #[error("invalid type equality proof: {0}")]
    InvalidEqualType(String),
    #[error("invalid coercion: {0}")]
    InvalidCoerce(String),
    #[error("invalid derivation: {0}")]
    InvalidDerivation(String),
    #[error("impossible: {0}")]
    Impossible(String),
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub loc: Loc,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.loc.is_known() {
            write!(f, "{} (at {})", self.kind, self.loc)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl Error {
    pub fn typing(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::Typing(msg.into()),
            loc,
        }
    }

    pub fn runtime(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::Runtime(msg.into()),
            loc,
        }
    }

    pub fn match_fail(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::MatchFail(msg.into()),
            loc,
        }
    }

    pub fn invalid_equal_term(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::InvalidEqualTerm(msg.into()),
            loc,
        }
    }

    pub fn invalid_equal_type(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::InvalidEqualType(msg.into()),
            loc,
        }
    }

    pub fn invalid_coerce(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::InvalidCoerce(msg.into()),
            loc,
        }
    }

    pub fn invalid_derivation(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::InvalidDerivation(msg.into()),
            loc,
        }
    }

    pub fn impossible(loc: Loc, msg: impl Into<String>) -> Error {
        Error {
            kind: ErrorKind::Impossible(msg.into()),
            loc,
        }
    }

    /// Fatal errors abort the toplevel; they cannot be expected by `fail`
    /// items or swallowed anywhere else.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidEqualTerm(_)
                | ErrorKind::InvalidEqualType(_)
                | ErrorKind::InvalidCoerce(_)
                | ErrorKind::InvalidDerivation(_)
                | ErrorKind::Impossible(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
