//! Resource quantity normalization
//!
//! Parses Kubernetes CPU and memory quantity strings into canonical units
//! (cores and MiB) and formats canonical values back into display strings.

use thiserror::Error;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;

/// Malformed quantity string
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind} quantity: {input:?}")]
pub struct QuantityError {
    pub kind: &'static str,
    pub input: String,
}

impl QuantityError {
    fn cpu(input: &str) -> Self {
        Self {
            kind: "cpu",
            input: input.to_string(),
        }
    }

    fn memory(input: &str) -> Self {
        Self {
            kind: "memory",
            input: input.to_string(),
        }
    }
}

/// Parse a CPU quantity into cores.
///
/// Accepts plain cores (`"2"`, `"0.5"`), millicores (`"500m"`),
/// micro/nano cores (`"250000u"`, `"1500000n"`) and exponent notation.
pub fn parse_cpu(input: &str) -> Result<f64, QuantityError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(QuantityError::cpu(input));
    }

    let (number, divisor) = if let Some(n) = s.strip_suffix('m') {
        (n, 1_000.0)
    } else if let Some(n) = s.strip_suffix('u') {
        (n, 1_000_000.0)
    } else if let Some(n) = s.strip_suffix('n') {
        (n, 1_000_000_000.0)
    } else {
        (s, 1.0)
    };

    let value = parse_number(number).ok_or_else(|| QuantityError::cpu(input))?;
    Ok(value / divisor)
}

/// Parse a memory quantity into MiB.
///
/// Binary (`Ki`..`Ei`) and decimal (`k`..`E`) suffixes are supported, as are
/// plain byte counts and exponent notation (`"129e6"`).
pub fn parse_memory_mib(input: &str) -> Result<f64, QuantityError> {
    parse_memory_bytes(input).map(|bytes| bytes / MIB)
}

/// Parse a memory quantity into bytes
pub fn parse_memory_bytes(input: &str) -> Result<f64, QuantityError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(QuantityError::memory(input));
    }

    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
        ("m", 1e-3),
    ];

    // Two-letter binary suffixes must be tried before the single letters.
    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = s.strip_suffix(suffix) {
            let value = parse_number(number).ok_or_else(|| QuantityError::memory(input))?;
            return Ok(value * multiplier);
        }
    }

    parse_number(s).ok_or_else(|| QuantityError::memory(input))
}

fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let value: f64 = s.parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Format cores for display: whole/fractional cores at or above one core,
/// millicores below. Non-zero values never render as zero.
pub fn format_cpu(cores: f64) -> String {
    if cores <= 0.0 {
        return "0".to_string();
    }
    if cores >= 1.0 {
        return trim_float(cores, 2);
    }
    let millis = (cores * 1000.0).round().max(1.0);
    format!("{}m", millis as u64)
}

/// Format MiB for display using the nearest common binary unit
pub fn format_memory(mib: f64) -> String {
    if mib <= 0.0 {
        return "0".to_string();
    }
    if mib >= 1024.0 {
        format!("{}Gi", trim_float(mib / 1024.0, 2))
    } else if mib >= 1.0 {
        format!("{}Mi", trim_float(mib, 1))
    } else {
        let kib = (mib * 1024.0).round().max(1.0);
        format!("{}Ki", kib as u64)
    }
}

/// Format a byte count using the nearest common binary unit
pub fn format_bytes(bytes: f64) -> String {
    if bytes >= KIB {
        format_memory(bytes / MIB)
    } else if bytes <= 0.0 {
        "0".to_string()
    } else {
        format!("{}B", bytes.round() as u64)
    }
}

fn trim_float(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*}", precision, value);
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_cpu_units() {
        assert!(approx(parse_cpu("500m").unwrap(), 0.5));
        assert!(approx(parse_cpu("2").unwrap(), 2.0));
        assert!(approx(parse_cpu("0.25").unwrap(), 0.25));
        assert!(approx(parse_cpu("250000u").unwrap(), 0.25));
        assert!(approx(parse_cpu("1500000n").unwrap(), 0.0015));
        assert!(approx(parse_cpu("1e3m").unwrap(), 1.0));
    }

    #[test]
    fn test_parse_memory_units() {
        assert!(approx(parse_memory_mib("2Gi").unwrap(), 2048.0));
        assert!(approx(parse_memory_mib("128Ki").unwrap(), 0.125));
        assert!(approx(parse_memory_mib("256Mi").unwrap(), 256.0));
        assert!(approx(parse_memory_mib("1048576").unwrap(), 1.0));
        assert!(approx(parse_memory_bytes("1k").unwrap(), 1000.0));
        assert!(approx(parse_memory_bytes("129e6").unwrap(), 129e6));
        assert!(approx(parse_memory_bytes("1M").unwrap(), 1e6));
        assert!(approx(parse_memory_mib("1Ti").unwrap(), 1024.0 * 1024.0));
    }

    #[test]
    fn test_parse_rejects_malformed_quantities() {
        assert!(parse_cpu("").is_err());
        assert!(parse_cpu("abc").is_err());
        assert!(parse_cpu("-1").is_err());
        assert!(parse_memory_mib("Gi").is_err());
        assert!(parse_memory_mib("12XB").is_err());

        let err = parse_memory_mib("lots").unwrap_err();
        assert_eq!(err.kind, "memory");
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_format_memory_picks_display_unit() {
        assert_eq!(format_memory(2048.0), "2Gi");
        assert_eq!(format_memory(1536.0), "1.5Gi");
        assert_eq!(format_memory(256.0), "256Mi");
        assert_eq!(format_memory(0.125), "128Ki");
        assert_eq!(format_memory(0.0), "0");
    }

    #[test]
    fn test_format_never_rounds_nonzero_to_zero() {
        assert_eq!(format_memory(1.0), "1Mi");
        assert_eq!(format_memory(1024.0), "1Gi");
        assert_eq!(format_memory(0.0001), "1Ki");
        assert_eq!(format_cpu(1.0), "1");
        assert_eq!(format_cpu(0.0001), "1m");
        assert_eq!(format_cpu(0.5), "500m");
        assert_eq!(format_cpu(2.5), "2.5");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512.0), "512B");
        assert_eq!(format_bytes(2.0 * 1024.0 * 1024.0 * 1024.0), "2Gi");
    }
}
