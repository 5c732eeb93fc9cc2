use crate::core::commands::{transmit, Command, Transport};
use crate::core::error::Result;
use pcsc::MAX_BUFFER_SIZE;
use std::fmt;

const PSEUDO_APDU_CLASS: u8 = 0xFF;
const INS_GET_DATA: u8 = 0xCA;
const INS_READ_BINARY: u8 = 0xB0;
const INS_UPDATE_BINARY: u8 = 0xD6;
const INS_READER_CONTROL: u8 = 0x00;
const P1_BUZZER: u8 = 0x52;
const GET_VERSION: u8 = 0x60;

/// Tag family as reported by GET_VERSION
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Ntag213,
    Ntag215,
    Ntag216,
    UnknownNtag,
    InvalidResponse,
    Unsupported,
}

impl TagType {
    /// Decode a GET_VERSION reply, storage size byte at index 2
    pub fn from_version_response(response: &[u8]) -> Self {
        if response.len() > 3 && response[0] == 0x00 {
            match response[2] {
                0x0F => TagType::Ntag213,
                0x11 => TagType::Ntag215,
                0x13 => TagType::Ntag216,
                _ => TagType::UnknownNtag,
            }
        } else {
            TagType::InvalidResponse
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TagType::Ntag213 => "NTAG 213",
            TagType::Ntag215 => "NTAG 215",
            TagType::Ntag216 => "NTAG 216",
            TagType::UnknownNtag => "Unknown NTAG",
            TagType::InvalidResponse => "Invalid response",
            TagType::Unsupported => "Unknown or unsupported tag.",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read the tag UID, cut (or zero filled) to `uid_length` bytes
pub fn get_uid<T: Transport + ?Sized>(card: &T, uid_length: usize) -> Result<Vec<u8>> {
    let command = Command::apdu(PSEUDO_APDU_CLASS, INS_GET_DATA, 0x00, 0x00, 0x00);
    let mut uid = vec![0u8; MAX_BUFFER_SIZE.max(uid_length)];

    transmit(card, &command, &mut uid)?;
    uid.truncate(uid_length);

    Ok(uid)
}

/// Read `length` bytes starting at `block`; the status trailer is dropped
pub fn read_block<T: Transport + ?Sized>(card: &T, block: u8, length: u8) -> Result<Vec<u8>> {
    let command = Command::apdu(PSEUDO_APDU_CLASS, INS_READ_BINARY, 0x00, block, length);
    let mut data = vec![0u8; length as usize + 2];

    transmit(card, &command, &mut data)?;
    data.truncate(length as usize);

    Ok(data)
}

pub fn write_block<T: Transport + ?Sized>(
    card: &T,
    block: u8,
    length: u8,
    data: &[u8],
) -> Result<()> {
    let command = Command::apdu(PSEUDO_APDU_CLASS, INS_UPDATE_BINARY, 0x00, block, length)
        .with_payload(data);
    let mut trailer = [0u8; 2];

    transmit(card, &command, &mut trailer)?;
    Ok(())
}

/// Identify the tag; never fails, errors degrade to a placeholder type
pub fn get_tag_type<T: Transport + ?Sized>(card: &T) -> TagType {
    let mut response = [0u8; MAX_BUFFER_SIZE];

    match transmit(card, &Command::native(&[GET_VERSION]), &mut response) {
        Ok(reply) => TagType::from_version_response(reply),
        Err(e) => {
            log::warn!("GET_VERSION failed: {e}");
            TagType::Unsupported
        }
    }
}

/// Turn the buzzer that sounds on card detection on or off
pub fn set_buzzer<T: Transport + ?Sized>(card: &T, on: bool) -> Result<()> {
    let state = if on { 0xFF } else { 0x00 };
    let command = Command::apdu(PSEUDO_APDU_CLASS, INS_READER_CONTROL, P1_BUZZER, state, 0x00);
    let mut trailer = [0u8; 2];

    transmit(card, &command, &mut trailer)?;
    Ok(())
}
