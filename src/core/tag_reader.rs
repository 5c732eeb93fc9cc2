use crate::core::bulk::{read_data, write_data};
use crate::core::commands::Transport;
use crate::core::config::SessionConfig;
use crate::core::error::Result;
use crate::core::session::CardHandler;
use crate::core::tag::{get_tag_type, get_uid};
use crate::core::utils::format_hex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

/// Everything read from one tag during one insertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    pub reader: String,
    #[serde(with = "hex")]
    pub uid: Vec<u8>,
    #[serde(with = "hex")]
    pub data: Vec<u8>,
    pub tag_type: String,
    pub present: bool,
    /// Set when a payload was written before reading
    pub verified: Option<bool>,
    pub read_at: Option<DateTime<Utc>>,
}

impl ReadResult {
    pub fn uid_hex(&self) -> String {
        format_hex(&self.uid)
    }

    /// Data as text, without the zero padding of the transfer area
    pub fn text(&self) -> String {
        let end = self
            .data
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Read(ReadResult),
    Removed { reader: String },
}

/// Reads UID, data and type on every accepted insertion
pub struct TagReader {
    config: SessionConfig,
    payload: Option<Vec<u8>>,
    current: ReadResult,
    events: Sender<TagEvent>,
}

impl TagReader {
    pub fn new(config: SessionConfig, events: Sender<TagEvent>) -> Self {
        Self {
            config,
            payload: None,
            current: ReadResult::default(),
            events,
        }
    }

    /// Write `payload` to every tag before reading it
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn current(&self) -> &ReadResult {
        &self.current
    }

    fn read_cycle(&self, reader: &str, card: &dyn Transport) -> Result<ReadResult> {
        let verified = match &self.payload {
            Some(payload) => Some(write_data(card, &self.config, payload)?),
            None => None,
        };

        let uid = get_uid(card, self.config.uid_length)?;
        let data = read_data(card, &self.config)?;
        let tag_type = get_tag_type(card);

        Ok(ReadResult {
            reader: reader.to_string(),
            uid,
            data,
            tag_type: tag_type.to_string(),
            present: true,
            verified,
            read_at: Some(Utc::now()),
        })
    }

    fn emit(&self, event: TagEvent) {
        if self.events.send(event).is_err() {
            log::debug!("No listener for tag events");
        }
    }
}

impl CardHandler for TagReader {
    fn on_inserted(&mut self, reader: &str, card: &dyn Transport) -> Result<()> {
        match self.read_cycle(reader, card) {
            Ok(result) => {
                log::info!("Read tag {} ({})", result.uid_hex(), result.tag_type);
                self.current = result.clone();
                self.emit(TagEvent::Read(result));
                Ok(())
            }
            Err(e) => {
                self.current = ReadResult::default();
                Err(e)
            }
        }
    }

    fn on_removed(&mut self, reader: &str) {
        self.current.present = false;
        self.emit(TagEvent::Removed {
            reader: reader.to_string(),
        });
    }
}
