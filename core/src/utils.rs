use regex::Regex;
use std::sync::OnceLock;

/// Format duration from seconds to human-readable format
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Format bytes as human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Multiplier for a size unit. `KiB`/`MiB` and the lower-case prefix forms
/// (`kB`, `mB`) are binary, `KB`/`Kb` are decimal.
fn unit_multiplier(unit: &str) -> Option<u64> {
    const PREFIXES: &str = "KMGTPE";

    if unit == "B" || unit == "b" || unit.is_empty() {
        return Some(1);
    }

    let mut chars = unit.chars();
    let prefix = chars.next()?;
    let suffix = chars.as_str();
    let power = PREFIXES.find(prefix.to_ascii_uppercase())? as u32 + 1;

    let binary = match (prefix.is_ascii_uppercase(), suffix) {
        (true, "iB") => true,
        (true, "B") | (true, "b") => false,
        (false, "B") => true,
        _ => return None,
    };

    let base: u64 = if binary { 1024 } else { 1000 };
    base.checked_pow(power)
}

/// Parse a human-written size such as `10M`, `1.5GiB` or `500 kB` into bytes.
///
/// A bare number is taken as bytes. Returns `None` for anything unreadable.
pub fn parse_filesize(text: &str) -> Option<u64> {
    static SIZE_RE: OnceLock<Regex> = OnceLock::new();
    let re = SIZE_RE.get_or_init(|| {
        Regex::new(r"^\s*([0-9]+(?:[.,][0-9]*)?)\s*([A-Za-z]*)\s*$").expect("valid size regex")
    });

    let captures = re.captures(text)?;
    let number: f64 = captures[1].replace(',', ".").parse().ok()?;

    // A bare prefix ("10M") counts as bytes of that prefix.
    let unit = &captures[2];
    let multiplier = match unit.len() {
        1 if !unit.eq_ignore_ascii_case("b") => unit_multiplier(&format!("{}B", unit))?,
        _ => unit_multiplier(unit)?,
    };

    Some((number * multiplier as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(3661), "01:01:01");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(50 * 1024 * 1024), "50.0 MB");
    }

    #[test]
    fn test_parse_filesize_units() {
        assert_eq!(parse_filesize("1024"), Some(1024));
        assert_eq!(parse_filesize("5 B"), Some(5));
        assert_eq!(parse_filesize("2KB"), Some(2000));
        assert_eq!(parse_filesize("2kB"), Some(2048));
        assert_eq!(parse_filesize("2KiB"), Some(2048));
        assert_eq!(parse_filesize("1.5MiB"), Some(1_572_864));
        assert_eq!(parse_filesize("1,5MB"), Some(1_500_000));
        assert_eq!(parse_filesize("3Gb"), Some(3_000_000_000));
        assert_eq!(parse_filesize("10M"), Some(10_000_000));
    }

    #[test]
    fn test_parse_filesize_rejects_garbage() {
        assert_eq!(parse_filesize(""), None);
        assert_eq!(parse_filesize("ten MB"), None);
        assert_eq!(parse_filesize("10 XB"), None);
    }
}
