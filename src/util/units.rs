//! Byte count formatting for console output.

const UNITS: [&str; 9] = ["bytes", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Formats a byte count with binary units, two decimals above 1 KiB.
pub fn human_readable(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let mut scaled = bytes as f64;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", scaled, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_counts_stay_in_bytes() {
        assert_eq!(human_readable(0), "0 bytes");
        assert_eq!(human_readable(1023), "1023 bytes");
    }

    #[test]
    fn scales_to_binary_units() {
        assert_eq!(human_readable(1024), "1.00 KiB");
        assert_eq!(human_readable(1536), "1.50 KiB");
        assert_eq!(human_readable(5 * 1024 * 1024 * 1024), "5.00 GiB");
    }
}
