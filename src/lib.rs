/// NTAG reader/writer engine for PC/SC contactless readers
///
/// Frames the reader's pseudo-APDUs, moves data to and from the tag in
/// block-sized chunks with readback verification, and turns reader status
/// changes into debounced insertion/removal cycles.
pub mod cli;
pub mod core;

// Re-export commonly used types
pub use crate::core::{
    bulk::{read_data, write_data},
    commands::{Command, Transport},
    config::SessionConfig,
    device::DeviceSession,
    error::{Error, Result},
    reader::{PcscReader, ReaderInfo},
    session::{CardHandler, CardProvider, CycleOutcome, Session, SlotSignal, SlotState},
    tag::{get_tag_type, get_uid, read_block, set_buzzer, write_block, TagType},
    tag_reader::{ReadResult, TagEvent, TagReader},
    utils::{format_hex, parse_hex},
};
