use crate::core::error::{Error, Result};
use crate::core::session::CardProvider;
use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode};
use serde::{Deserialize, Serialize};
use std::ffi::CString;

/// Information about a PCSC reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderInfo {
    pub name: String,
    pub card_present: bool,
    pub atr: Option<Vec<u8>>,
}

/// System-scope PC/SC context that hands out reader connections
pub struct PcscReader {
    context: Context,
}

impl PcscReader {
    /// Establish a system-scope context with the smart card service
    pub fn establish() -> Result<Self> {
        let context = Context::establish(Scope::System).map_err(Error::ResourceUnavailable)?;
        log::debug!("PC/SC context established");

        Ok(Self { context })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Names of all attached readers
    pub fn reader_names(&self) -> Result<Vec<String>> {
        let mut readers_buf = vec![0; 2048];
        match self.context.list_readers(&mut readers_buf) {
            Ok(readers) => Ok(readers
                .map(|name| name.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(Error::ResourceUnavailable(e)),
        }
    }

    /// List all readers with card presence and ATR
    pub fn list_readers(&self) -> Result<Vec<ReaderInfo>> {
        let names = self.reader_names()?;

        Ok(names
            .into_iter()
            .map(|name| {
                let (card_present, atr) = self.probe(&name);
                ReaderInfo {
                    name,
                    card_present,
                    atr,
                }
            })
            .collect())
    }

    fn probe(&self, reader_name: &str) -> (bool, Option<Vec<u8>>) {
        match self.open(reader_name) {
            Ok(card) => {
                let atr = card.status2_owned().ok().map(|status| status.atr().to_vec());
                self.release(card);
                (true, atr)
            }
            Err(_) => (false, None),
        }
    }

    fn open(&self, reader_name: &str) -> Result<Card> {
        let reader_cstr = CString::new(reader_name)
            .map_err(|_| Error::InvalidReaderName(reader_name.to_string()))?;

        self.context
            .connect(&reader_cstr, ShareMode::Shared, Protocols::ANY)
            .map_err(|source| Error::Connect {
                reader: reader_name.to_string(),
                source,
            })
    }
}

impl CardProvider for PcscReader {
    type Card = Card;

    fn connect(&self, reader: &str) -> Result<Card> {
        log::debug!("Connecting to reader: {reader}");
        let card = self.open(reader)?;
        log::debug!("Connected to reader: {reader}");
        Ok(card)
    }

    fn release(&self, card: Card) {
        let _ = card
            .disconnect(Disposition::LeaveCard)
            .map_err(|(_, e)| log::warn!("Failed to disconnect cleanly from card: {e}"));
    }
}
