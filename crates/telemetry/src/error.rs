use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
	#[error("Invalid log level: {0}. Valid values are: trace, debug, info, warn, error")]
	InvalidLogLevel(String),

	#[error("Logger has not been initialized")]
	NotInitialized,

	#[error("Logger is already initialized")]
	AlreadyInitialized,

	#[error("Failed to reload log level: {0}")]
	ReloadFailed(String),
}
