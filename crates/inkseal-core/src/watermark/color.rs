use image::Rgb;

use crate::error::{InksealError, Operation, Result};

/// Parse `#RRGGBB` (the `#` is optional). Shorthand `#RGB` is not accepted.
pub fn parse_hex_color(value: &str, operation: Operation) -> Result<Rgb<u8>> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(InksealError::decode(
            operation,
            format!("invalid hex color '{}'", value),
        ));
    }

    let mut rgb = [0u8; 3];
    for (i, slot) in rgb.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| {
            InksealError::decode(operation, format!("invalid hex color '{}'", value))
        })?;
    }
    Ok(Rgb(rgb))
}
