use thiserror::Error;

/// Errors raised by the reader/writer engine
#[derive(Debug, Error)]
pub enum Error {
    /// The PC/SC service could not be reached
    #[error("smart card service unavailable: {0}")]
    ResourceUnavailable(#[source] pcsc::Error),

    #[error("no smart card readers found")]
    NoReaders,

    #[error("invalid reader name: {0:?}")]
    InvalidReaderName(String),

    /// Reader busy, absent, or no tag in the field
    #[error("failed to connect to reader '{reader}': {source}")]
    Connect {
        reader: String,
        #[source]
        source: pcsc::Error,
    },

    /// A command failed at the transport level
    #[error("failed to transmit command {command}: {source}")]
    Transmit {
        command: String,
        #[source]
        source: pcsc::Error,
    },

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start card monitor: {0}")]
    Monitor(#[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
