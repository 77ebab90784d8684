//! Exit classification shared by every fatal error in the workspace.
//!
//! Each crate defines its own domain-specific error enum; the ones that can
//! abort a run map themselves onto an [`ExitClass`].

use std::fmt;

/// Process exit classification for a fatal bootstrap failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitClass {
    /// Invalid or incomplete configuration (`EX_USAGE`).
    Config,
    /// A VCS subprocess failed.
    Checkout,
    /// A template could not be rendered (`EX_DATAERR`).
    Template,
    /// Privileges could not be dropped or the command could not be executed.
    Handover,
    /// The command to hand over to does not exist.
    CommandNotFound,
}

impl ExitClass {
    /// Returns the numeric process exit code for this class.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Config => 64,
            Self::Template => 65,
            Self::Handover => 126,
            Self::CommandNotFound => 127,
            Self::Checkout => 128,
        }
    }
}

impl fmt::Display for ExitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Checkout => write!(f, "checkout"),
            Self::Template => write!(f, "template"),
            Self::Handover => write!(f, "handover"),
            Self::CommandNotFound => write!(f, "command-not-found"),
        }
    }
}
