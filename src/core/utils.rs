use anyhow::{bail, Context, Result};

/// Parse a hex string into bytes
/// Accepts "0102030A", "01 02 03 0A", "0x01,0x02" and "01:02:03" styles.
pub fn parse_hex(hex_str: &str) -> Result<Vec<u8>> {
    let cleaned = clean_hex_string(hex_str);

    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    if cleaned.len() % 2 != 0 {
        bail!(
            "Hex string must have even number of characters: '{}'",
            hex_str
        );
    }

    hex::decode(&cleaned).with_context(|| format!("Invalid hex string: '{hex_str}'"))
}

fn clean_hex_string(hex_str: &str) -> String {
    hex_str
        .trim()
        .replace("0x", "")
        .replace("0X", "")
        .chars()
        .filter(|c| !matches!(c, ' ' | ',' | ':' | '-' | '\t' | '\n' | '\r'))
        .collect::<String>()
        .to_uppercase()
}

/// Format bytes as a hex string
pub fn format_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Format bytes as a hex string with spaces
pub fn format_hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format bytes as ASCII, replacing non-printable chars with '.'
pub fn format_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Tag memory dump, one line per `block_size` bytes labelled with the block number
pub fn format_block_dump(bytes: &[u8], start_block: u8, block_size: usize) -> String {
    if bytes.is_empty() || block_size == 0 {
        return String::from("(empty)");
    }

    bytes
        .chunks(block_size)
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[{:3}] {:<width$} |{}|",
                start_block as usize + i,
                format_hex_spaced(chunk),
                format_ascii(chunk),
                width = block_size * 3 - 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Meaning of an ACR122U pseudo-APDU status trailer
pub fn describe_status_word(sw1: u8, sw2: u8) -> String {
    match (sw1, sw2) {
        (0x90, 0x00) => "Success".to_string(),
        (0x61, n) => format!("Success, {n} bytes available"),
        (0x63, 0x00) => "Error: Operation failed".to_string(),
        (0x62, 0x82) => "Warning: End of data reached before Le bytes".to_string(),
        (0x67, 0x00) => "Error: Wrong length".to_string(),
        (0x68, 0x00) => "Error: Functions in CLA not supported".to_string(),
        (0x69, 0x81) => "Error: Command incompatible".to_string(),
        (0x69, 0x82) => "Error: Security status not satisfied".to_string(),
        (0x69, 0x86) => "Error: Command not allowed".to_string(),
        (0x6A, 0x81) => "Error: Function not supported".to_string(),
        (0x6A, 0x82) => "Error: Block address out of range".to_string(),
        (0x6B, 0x00) => "Error: Wrong parameter(s) P1-P2".to_string(),
        (0x6C, n) => format!("Error: Wrong Le field, exact length: {n}"),
        (0x6D, 0x00) => "Error: Instruction code not supported or invalid".to_string(),
        (0x6E, 0x00) => "Error: Class not supported".to_string(),
        _ => format!("Unknown status: {sw1:02X} {sw2:02X}"),
    }
}
