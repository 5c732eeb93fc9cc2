use crate::core::error::{Error, Result};
use pcsc::MAX_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_TRANSFER_LENGTH: usize = 50;
pub const DEFAULT_BLOCK_SIZE: usize = 4;
pub const DEFAULT_START_BLOCK: u8 = 4;
pub const DEFAULT_READBACK_DELAY_MS: u64 = 200;
pub const DEFAULT_UID_LENGTH: usize = 7;

/// Session-wide settings, shared read-only by every tag operation
///
/// Defaults match an NTAG213 user area starting at page 4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub buzzer_enabled: bool,
    pub max_transfer_length: usize,
    pub block_size: usize,
    pub start_block: u8,
    pub readback_delay_ms: u64,
    pub uid_length: usize,
}

impl SessionConfig {
    pub fn new(
        buzzer_enabled: bool,
        max_transfer_length: usize,
        block_size: usize,
        start_block: u8,
        readback_delay_ms: u64,
    ) -> Self {
        Self {
            buzzer_enabled,
            max_transfer_length,
            block_size,
            start_block,
            readback_delay_ms,
            uid_length: DEFAULT_UID_LENGTH,
        }
    }

    pub fn with_uid_length(mut self, uid_length: usize) -> Self {
        self.uid_length = uid_length;
        self
    }

    pub fn readback_delay(&self) -> Duration {
        Duration::from_millis(self.readback_delay_ms)
    }

    /// Number of blocks spanned by the transfer area
    pub fn block_count(&self) -> usize {
        if self.block_size == 0 {
            return 0;
        }
        self.max_transfer_length.div_ceil(self.block_size)
    }

    /// Check the invariants every chunked transfer relies on
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block size must be greater than zero".into()));
        }
        if self.block_size > u8::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "block size {} does not fit the one-byte length field",
                self.block_size
            )));
        }
        if self.uid_length == 0 {
            return Err(Error::InvalidConfig("UID length must be greater than zero".into()));
        }
        if self.uid_length > MAX_BUFFER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "UID length {} exceeds the {MAX_BUFFER_SIZE}-byte reply buffer",
                self.uid_length
            )));
        }

        // Blocks start_block..=255 are addressable
        let addressable = u8::MAX as usize + 1 - self.start_block as usize;
        if self.block_count() > addressable {
            return Err(Error::InvalidConfig(format!(
                "transfer of {} bytes in {}-byte blocks from block {} runs past block 255",
                self.max_transfer_length, self.block_size, self.start_block
            )));
        }

        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(
            false,
            DEFAULT_MAX_TRANSFER_LENGTH,
            DEFAULT_BLOCK_SIZE,
            DEFAULT_START_BLOCK,
            DEFAULT_READBACK_DELAY_MS,
        )
    }
}
