//! Human-readable formatting for byte sizes used in error messages.

/// Formats a byte count with binary units (`1.50MB`, `512B`).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0B".to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{size:.0}{}", UNITS[unit_index])
    } else if size.fract() == 0.0 {
        // Whole units read better without decimals ("100MB", not "100.0MB")
        format!("{size:.0}{}", UNITS[unit_index])
    } else if size >= 10.0 {
        format!("{size:.1}{}", UNITS[unit_index])
    } else {
        format!("{size:.2}{}", UNITS[unit_index])
    }
}

/// Formats a compression ratio as `N:1`.
#[must_use]
pub fn format_ratio(ratio: f64) -> String {
    if ratio.is_infinite() {
        return "inf:1".to_string();
    }
    if ratio >= 10.0 {
        format!("{ratio:.0}:1")
    } else {
        format!("{ratio:.1}:1")
    }
}
