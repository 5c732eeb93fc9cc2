//! In-memory NTAG behind an ACR122U, answering the reader's pseudo-APDUs.
#![allow(dead_code)]

use ntag_rw::core::commands::Transport;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::time::Instant;

pub const TEST_UID: [u8; 7] = [0x04, 0xA2, 0x3B, 0x1A, 0x5C, 0x6D, 0x80];

/// Command seen by the simulated tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub command: Vec<u8>,
    pub at: Instant,
}

pub struct SimulatedNtag {
    pages: RefCell<Vec<u8>>,
    page_size: usize,
    uid_reply: Vec<u8>,
    version_reply: Option<Vec<u8>>,
    locked: HashSet<u8>,
    fail_after: Cell<Option<usize>>,
    log: RefCell<Vec<Exchange>>,
}

impl SimulatedNtag {
    /// NTAG213-sized memory (45 pages of 4 bytes)
    pub fn new() -> Self {
        Self::with_pages(45, 4)
    }

    pub fn with_pages(pages: usize, page_size: usize) -> Self {
        let mut uid_reply = TEST_UID.to_vec();
        uid_reply.extend_from_slice(&[0x90, 0x00]);
        Self {
            pages: RefCell::new(vec![0; pages * page_size]),
            page_size,
            uid_reply,
            version_reply: Some(vec![0x00, 0x04, 0x0F, 0x02, 0x01, 0x00, 0x0F, 0x03]),
            locked: HashSet::new(),
            fail_after: Cell::new(None),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn with_uid_reply(mut self, reply: &[u8]) -> Self {
        self.uid_reply = reply.to_vec();
        self
    }

    /// `None` makes GET_VERSION fail at the transport level
    pub fn with_version_reply(mut self, reply: Option<&[u8]>) -> Self {
        self.version_reply = reply.map(|r| r.to_vec());
        self
    }

    /// Writes to `block` are acknowledged but not stored
    pub fn with_locked_block(mut self, block: u8) -> Self {
        self.locked.insert(block);
        self
    }

    /// Let `n` more exchanges succeed, then fail every one after
    pub fn fail_after(&self, n: usize) {
        self.fail_after.set(Some(n));
    }

    pub fn memory(&self) -> Vec<u8> {
        self.pages.borrow().clone()
    }

    pub fn block(&self, block: u8) -> Vec<u8> {
        let start = block as usize * self.page_size;
        self.pages.borrow()[start..start + self.page_size].to_vec()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.log.borrow().clone()
    }

    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.log.borrow().iter().map(|e| e.command.clone()).collect()
    }

    /// Block numbers addressed by READ/UPDATE BINARY, in order
    pub fn addressed_blocks(&self) -> Vec<(u8, u8)> {
        self.commands()
            .iter()
            .filter(|c| c.len() >= 5 && c[0] == 0xFF && (c[1] == 0xB0 || c[1] == 0xD6))
            .map(|c| (c[1], c[3]))
            .collect()
    }
}

impl Default for SimulatedNtag {
    fn default() -> Self {
        Self::new()
    }
}

fn reply(response: &mut [u8], bytes: &[u8]) -> Result<usize, pcsc::Error> {
    if bytes.len() > response.len() {
        return Err(pcsc::Error::InsufficientBuffer);
    }
    response[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

impl Transport for SimulatedNtag {
    fn transmit(&self, command: &[u8], response: &mut [u8]) -> Result<usize, pcsc::Error> {
        self.log.borrow_mut().push(Exchange {
            command: command.to_vec(),
            at: Instant::now(),
        });

        if let Some(remaining) = self.fail_after.get() {
            if remaining == 0 {
                return Err(pcsc::Error::RemovedCard);
            }
            self.fail_after.set(Some(remaining - 1));
        }

        match command {
            [0x60] => match &self.version_reply {
                Some(version) => reply(response, version),
                None => Err(pcsc::Error::NotTransacted),
            },
            [0xFF, 0xCA, 0x00, 0x00, 0x00] => reply(response, &self.uid_reply),
            [0xFF, 0x00, 0x52, _, 0x00] => reply(response, &[0x90, 0x00]),
            [0xFF, 0xB0, 0x00, block, len] => {
                let start = *block as usize * self.page_size;
                let end = start + *len as usize;
                let pages = self.pages.borrow();
                if end > pages.len() {
                    return reply(response, &[0x63, 0x00]);
                }
                let mut out = pages[start..end].to_vec();
                out.extend_from_slice(&[0x90, 0x00]);
                reply(response, &out)
            }
            [0xFF, 0xD6, 0x00, block, len, data @ ..] => {
                let start = *block as usize * self.page_size;
                let mut pages = self.pages.borrow_mut();
                if data.len() != *len as usize || start + data.len() > pages.len() {
                    return reply(response, &[0x63, 0x00]);
                }
                if !self.locked.contains(block) {
                    pages[start..start + data.len()].copy_from_slice(data);
                }
                reply(response, &[0x90, 0x00])
            }
            _ => reply(response, &[0x6D, 0x00]),
        }
    }
}
