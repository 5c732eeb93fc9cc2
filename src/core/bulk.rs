use crate::core::config::SessionConfig;
use crate::core::error::Result;
use crate::core::commands::Transport;
use crate::core::tag::{read_block, write_block};
use crate::core::utils::format_hex_spaced;
use std::ops::Range;
use std::thread;

/// One block-sized slice of the transfer area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub block: u8,
    pub offset: usize,
    pub len: usize,
}

impl Chunk {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Split `[0, max_transfer_length)` into consecutive chunks
///
/// One block moves per exchange, so chunk `i` is addressed at
/// `start_block + i`. Every chunk is `block_size` long except possibly the
/// last one.
pub fn plan_chunks(config: &SessionConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let chunks = (0..config.block_count())
        .map(|i| {
            let offset = i * config.block_size;
            Chunk {
                // validate() guarantees the block index fits
                block: (config.start_block as usize + i) as u8,
                offset,
                len: config.block_size.min(config.max_transfer_length - offset),
            }
        })
        .collect();

    Ok(chunks)
}

/// Write `payload` across the transfer area and verify it by reading back
///
/// The payload is cut or zero padded to `max_transfer_length`. Returns
/// whether the readback matched; transport failures abort the transfer.
pub fn write_data<T: Transport + ?Sized>(
    card: &T,
    config: &SessionConfig,
    payload: &[u8],
) -> Result<bool> {
    let chunks = plan_chunks(config)?;

    if payload.len() > config.max_transfer_length {
        log::warn!(
            "Payload of {} bytes truncated to {}",
            payload.len(),
            config.max_transfer_length
        );
    }
    let mut padded = payload.to_vec();
    padded.resize(config.max_transfer_length, 0);

    log::info!(
        "Writing {} bytes to blocks {}..{}",
        padded.len(),
        config.start_block,
        config.start_block as usize + chunks.len()
    );

    for chunk in &chunks {
        // Short final chunk still goes out as a full block
        let mut block = vec![0u8; config.block_size];
        block[..chunk.len].copy_from_slice(&padded[chunk.range()]);
        write_block(card, chunk.block, config.block_size as u8, &block)?;
    }

    thread::sleep(config.readback_delay());

    let readback = read_data(card, config)?;
    let verified = readback == padded;
    if verified {
        log::info!("Write verified");
    } else {
        log::warn!(
            "Readback mismatch: wrote {} read {}",
            format_hex_spaced(&padded),
            format_hex_spaced(&readback)
        );
    }

    Ok(verified)
}

/// Read the whole transfer area, always exactly `max_transfer_length` bytes
pub fn read_data<T: Transport + ?Sized>(card: &T, config: &SessionConfig) -> Result<Vec<u8>> {
    let chunks = plan_chunks(config)?;
    let mut data = Vec::with_capacity(config.max_transfer_length);

    for chunk in &chunks {
        data.extend(read_block(card, chunk.block, chunk.len as u8)?);
    }

    log::debug!("Read {} bytes from {} blocks", data.len(), chunks.len());
    Ok(data)
}
