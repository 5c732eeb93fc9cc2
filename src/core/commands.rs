use crate::core::error::{Error, Result};
use crate::core::utils::{describe_status_word, format_hex, format_hex_spaced};
use pcsc::Card;

/// Byte channel to a connected reader
///
/// Implementations write the reply into `response` and return how many
/// bytes were written. Nothing is interpreted at this level.
pub trait Transport {
    fn transmit(&self, command: &[u8], response: &mut [u8]) -> Result<usize, pcsc::Error>;
}

impl Transport for Card {
    fn transmit(&self, command: &[u8], response: &mut [u8]) -> Result<usize, pcsc::Error> {
        Card::transmit(self, command, response).map(|reply| reply.len())
    }
}

/// A reader command, built fresh for every exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pseudo-APDU handled by the reader: CLA INS P1 P2 LEN [payload]
    Apdu {
        class: u8,
        instruction: u8,
        p1: u8,
        p2: u8,
        length: u8,
        payload: Vec<u8>,
    },
    /// Raw bytes passed through to the tag
    Native(Vec<u8>),
}

impl Command {
    pub fn apdu(class: u8, instruction: u8, p1: u8, p2: u8, length: u8) -> Self {
        Command::Apdu {
            class,
            instruction,
            p1,
            p2,
            length,
            payload: Vec::new(),
        }
    }

    pub fn native(bytes: &[u8]) -> Self {
        Command::Native(bytes.to_vec())
    }

    /// Append a data field to an APDU
    pub fn with_payload(self, data: &[u8]) -> Self {
        match self {
            Command::Apdu {
                class,
                instruction,
                p1,
                p2,
                length,
                mut payload,
            } => {
                payload.extend_from_slice(data);
                Command::Apdu {
                    class,
                    instruction,
                    p1,
                    p2,
                    length,
                    payload,
                }
            }
            Command::Native(mut bytes) => {
                bytes.extend_from_slice(data);
                Command::Native(bytes)
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Command::Apdu {
                class,
                instruction,
                p1,
                p2,
                length,
                payload,
            } => {
                let mut bytes = Vec::with_capacity(5 + payload.len());
                bytes.extend_from_slice(&[*class, *instruction, *p1, *p2, *length]);
                bytes.extend_from_slice(payload);
                bytes
            }
            Command::Native(bytes) => bytes.clone(),
        }
    }
}

/// Send `command` and return the part of `response` the reader filled in
///
/// Bytes of `response` past the returned slice are left untouched, so
/// callers that size their buffer up front can read it back whole.
pub fn transmit<'b, T: Transport + ?Sized>(
    card: &T,
    command: &Command,
    response: &'b mut [u8],
) -> Result<&'b [u8]> {
    let bytes = command.to_bytes();
    log::debug!("-> {}", format_hex_spaced(&bytes));

    let written = card
        .transmit(&bytes, response)
        .map_err(|source| {
            log::debug!("Transmit failed: {source}");
            Error::Transmit {
                command: format_hex(&bytes),
                source,
            }
        })?
        .min(response.len());

    let reply = &response[..written];
    if written >= 2 {
        // The trailer is not checked, only shown for diagnostics
        log::debug!(
            "<- {} ({})",
            format_hex_spaced(reply),
            describe_status_word(reply[written - 2], reply[written - 1])
        );
    } else {
        log::debug!("<- {}", format_hex_spaced(reply));
    }

    Ok(reply)
}
