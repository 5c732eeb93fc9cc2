use crate::core::config::SessionConfig;
use crate::core::error::{Error, Result};
use crate::core::monitor::{self, MonitorHandle};
use crate::core::reader::PcscReader;
use crate::core::session::{Session, SlotSignal};
use std::sync::mpsc::{self, Receiver};

/// A live connection to the smart card service with a running monitor
///
/// `session` dispatches the signals the monitor puts on `signals`. Dropping
/// `monitor` (or calling [`MonitorHandle::stop`]) ends the stream.
pub struct DeviceSession {
    pub session: Session<PcscReader>,
    pub signals: Receiver<SlotSignal>,
    pub monitor: MonitorHandle,
    pub readers: Vec<String>,
}

impl DeviceSession {
    /// Establish the context, enumerate readers and start monitoring all of them
    pub fn initialize(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let reader = PcscReader::establish()?;
        let readers = reader.reader_names()?;
        if readers.is_empty() {
            return Err(Error::NoReaders);
        }
        for name in &readers {
            log::info!("Found reader: {name}");
        }

        let (tx, rx) = mpsc::channel();
        let monitor = monitor::start(reader.context().clone(), &readers, tx)?;
        let session = Session::new(reader, config)?;

        Ok(Self {
            session,
            signals: rx,
            monitor,
            readers,
        })
    }
}
