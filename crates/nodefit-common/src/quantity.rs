//! Kubernetes resource quantity parsing
//!
//! Parses the quantity strings that appear in `kubectl get pods -o json`
//! output: CPU requests like `"250m"` or `"2"`, memory requests like
//! `"512Mi"`, `"2G"`, or plain byte counts. Memory occasionally shows up in
//! milli-bytes (e.g. `"128974848000m"`), so the `m` suffix is accepted there
//! too.

use thiserror::Error;

/// One binary gibibyte. Used for catalog sizes.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// One binary mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Errors from parsing a Kubernetes resource quantity
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuantityError {
    /// Quantity string is empty
    #[error("quantity cannot be empty")]
    Empty,

    /// Numeric portion failed to parse
    #[error("invalid number in quantity '{0}'")]
    InvalidNumber(String),

    /// Quantity is negative
    #[error("quantity '{0}' is negative")]
    Negative(String),

    /// Suffix is not a recognized unit for this resource
    #[error("unknown unit suffix '{suffix}' in quantity '{quantity}'")]
    UnknownSuffix { quantity: String, suffix: String },
}

/// Parse a CPU quantity into millicores.
///
/// Accepts a plain decimal core count (`"2"`, `"1.5"`) or a millicore value
/// with the `m` suffix (`"250m"`). Fractional millicores round to nearest.
pub fn parse_cpu(s: &str) -> Result<u64, QuantityError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    if let Some(value) = s.strip_suffix('m') {
        let millis = parse_number(value, s)?;
        return to_u64(millis, s);
    }

    let cores = parse_number(s, s)?;
    to_u64(cores * 1000.0, s)
}

/// Parse a memory quantity into bytes.
///
/// Accepts binary suffixes (`Ki`..`Ei`), decimal suffixes (`k`..`E`), the
/// milli-bytes suffix `m`, and plain byte counts. Decimal values are allowed
/// (`"1.5Gi"`).
pub fn parse_memory(s: &str) -> Result<u64, QuantityError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    // Longest suffixes first so "Ki" is not read as bare "i" after a number.
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ei", 1_152_921_504_606_846_976.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
        ("m", 1e-3),
    ];

    for (suffix, multiplier) in SUFFIXES {
        if let Some(value) = s.strip_suffix(suffix) {
            // "123E6" strips to "123E", which is not a number; fall through
            // and let the whole string parse as scientific notation instead.
            if let Ok(number) = value.parse::<f64>() {
                if !number.is_finite() {
                    return Err(QuantityError::InvalidNumber(s.to_string()));
                }
                if number < 0.0 {
                    return Err(QuantityError::Negative(s.to_string()));
                }
                return to_u64(number * multiplier, s);
            }
        }
    }

    // Plain byte count, possibly in scientific notation ("1e9").
    match s.parse::<f64>() {
        Ok(bytes) if bytes.is_finite() => {
            if bytes < 0.0 {
                return Err(QuantityError::Negative(s.to_string()));
            }
            to_u64(bytes, s)
        }
        _ => {
            let suffix: String = s
                .chars()
                .skip_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
                .collect();
            if suffix.is_empty() {
                Err(QuantityError::InvalidNumber(s.to_string()))
            } else {
                Err(QuantityError::UnknownSuffix {
                    quantity: s.to_string(),
                    suffix,
                })
            }
        }
    }
}

/// Render millicores as a human-readable core count ("2", "1.5", "0.25").
pub fn format_cpu(millicores: u64) -> String {
    if millicores % 1000 == 0 {
        return format!("{}", millicores / 1000);
    }
    let cores = millicores as f64 / 1000.0;
    let formatted = format!("{:.3}", cores);
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Render bytes in the largest fitting binary unit ("512.0 MiB", "4.0 GiB").
pub fn format_memory(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn parse_number(value: &str, original: &str) -> Result<f64, QuantityError> {
    let number: f64 = value
        .parse()
        .map_err(|_| QuantityError::InvalidNumber(original.to_string()))?;
    if !number.is_finite() {
        return Err(QuantityError::InvalidNumber(original.to_string()));
    }
    if number < 0.0 {
        return Err(QuantityError::Negative(original.to_string()));
    }
    Ok(number)
}

fn to_u64(value: f64, original: &str) -> Result<u64, QuantityError> {
    if !value.is_finite() || value < 0.0 || value > u64::MAX as f64 {
        return Err(QuantityError::InvalidNumber(original.to_string()));
    }
    Ok(value.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_millicores() {
        assert_eq!(parse_cpu("250m").unwrap(), 250);
        assert_eq!(parse_cpu("1500m").unwrap(), 1500);
        assert_eq!(parse_cpu("0m").unwrap(), 0);
    }

    #[test]
    fn test_parse_cpu_cores() {
        assert_eq!(parse_cpu("1").unwrap(), 1000);
        assert_eq!(parse_cpu("2.5").unwrap(), 2500);
        assert_eq!(parse_cpu("0.1").unwrap(), 100);
    }

    #[test]
    fn test_parse_cpu_invalid() {
        assert_eq!(parse_cpu(""), Err(QuantityError::Empty));
        assert!(matches!(
            parse_cpu("abc"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(parse_cpu("-1"), Err(QuantityError::Negative(_))));
    }

    #[test]
    fn test_parse_memory_binary_suffixes() {
        assert_eq!(parse_memory("1Ki").unwrap(), 1024);
        assert_eq!(parse_memory("512Mi").unwrap(), 512 * MIB);
        assert_eq!(parse_memory("2Gi").unwrap(), 2 * GIB);
        assert_eq!(parse_memory("1.5Gi").unwrap(), GIB + GIB / 2);
    }

    #[test]
    fn test_parse_memory_decimal_suffixes() {
        assert_eq!(parse_memory("1000k").unwrap(), 1_000_000);
        assert_eq!(parse_memory("128M").unwrap(), 128_000_000);
        assert_eq!(parse_memory("1G").unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_parse_memory_plain_and_millibytes() {
        assert_eq!(parse_memory("1048576").unwrap(), 1_048_576);
        // kubectl occasionally reports memory in milli-bytes
        assert_eq!(parse_memory("128974848000m").unwrap(), 128_974_848);
        assert_eq!(parse_memory("1e9").unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_parse_memory_invalid() {
        assert_eq!(parse_memory(""), Err(QuantityError::Empty));
        assert!(matches!(
            parse_memory("12Qi"),
            Err(QuantityError::UnknownSuffix { .. })
        ));
        assert!(matches!(
            parse_memory("-5Gi"),
            Err(QuantityError::Negative(_))
        ));
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(2000), "2");
        assert_eq!(format_cpu(2500), "2.5");
        assert_eq!(format_cpu(250), "0.25");
        assert_eq!(format_cpu(333), "0.333");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(512), "512 B");
        assert_eq!(format_memory(512 * MIB), "512.0 MiB");
        assert_eq!(format_memory(4 * GIB), "4.0 GiB");
        assert_eq!(format_memory(GIB + GIB / 2), "1.5 GiB");
    }
}
