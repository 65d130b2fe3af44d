/// Formats a byte count into a human-readable string (`1536` → `1.50 KB`),
/// used to render `byte_columns` in collected rows and report tables.
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes;
    let mut unit_index = 0;

    while size.abs() >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Formats a fraction (0.0-1.0 or already a 0-100 ratio) as a percentage
/// string with two decimal places, used to render `percent_columns`.
///
/// Values already expressed on a 0-100 scale are passed through; values on a
/// 0-1 scale are multiplied by 100 first, matching the `percent_columns`
/// convention of accepting either form from a collector's raw SQL result.
pub fn format_percent(value: f64) -> String {
    let scaled = if value.abs() <= 1.0 { value * 100.0 } else { value };
    format!("{:.2}%", scaled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_kilobytes() {
        assert_eq!(format_bytes(1536.0), "1.50 KB");
    }

    #[test]
    fn formats_sub_byte_unit() {
        assert_eq!(format_bytes(512.0), "512.00 B");
    }

    #[test]
    fn formats_fraction_as_percent() {
        assert_eq!(format_percent(0.925), "92.50%");
    }

    #[test]
    fn formats_already_scaled_percent() {
        assert_eq!(format_percent(92.5), "92.50%");
    }
}
