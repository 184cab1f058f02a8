use bagger_engine::{EngineError, NetError};

/// Process exit codes, stable for callers scripting around this program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    UserInterrupt,
    BadArgument,
    NoNetwork,
    FileError,
    ServerError,
    Exception,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::UserInterrupt => 1,
            ExitStatus::BadArgument => 2,
            ExitStatus::NoNetwork => 3,
            ExitStatus::FileError => 4,
            ExitStatus::ServerError => 5,
            ExitStatus::Exception => 6,
        }
    }

    /// Maps a pipeline failure onto the exit code taxonomy.
    pub fn for_error(error: &EngineError) -> ExitStatus {
        match error {
            EngineError::Net(NetError::Network(_)) => ExitStatus::NoNetwork,
            EngineError::Net(_) => ExitStatus::ServerError,
            EngineError::Parse(_) | EngineError::Internal(_) => ExitStatus::ServerError,
            EngineError::Io(_) | EngineError::Persist(_) => ExitStatus::FileError,
            EngineError::Bag(_) | EngineError::Archive(_) => ExitStatus::FileError,
        }
    }
}
