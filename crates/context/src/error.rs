use guildhall_realtime::StartError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
	#[error("realtime sync failed to start: {0}")]
	Start(#[from] StartError),
}

pub type Result<T, E = ContextError> = std::result::Result<T, E>;
