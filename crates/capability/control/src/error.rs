use lightd_protocol::ProtocolError;
use lightd_storage::StorageError;

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Light not found: {0}")]
    NotFound(String),
    #[error("unknown pattern '{0}'")]
    UnknownPattern(String),
    /// 路由无法识别或参数非法
    #[error("{0}")]
    InvalidCommand(String),
    #[error("invalid color '{0}'")]
    InvalidColor(String),
    #[error("dispatch error: {0}")]
    Dispatch(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ControlError {
    pub fn invalid_argument(arg: impl std::fmt::Display) -> Self {
        Self::InvalidCommand(format!("invalid argument '{}'", arg))
    }

    pub fn unknown_command(cmd: impl std::fmt::Display) -> Self {
        Self::InvalidCommand(format!("unknown command '{}'", cmd))
    }
}

impl From<StorageError> for ControlError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<ProtocolError> for ControlError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidColor(value) => Self::InvalidColor(value),
            other => Self::Dispatch(other.to_string()),
        }
    }
}
