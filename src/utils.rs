use crate::error::{EdfError, EdfResult};
use crate::TIME_DIMENSION;

/// Reads a fixed-width ASCII header field and strips the space padding.
pub fn read_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Writes `value` into `field`, left-aligned and padded with spaces.
/// Non-ASCII characters become `_`; overlong values are cut to the field width.
pub fn write_field(field: &mut [u8], value: &str) {
    field.fill(b' ');
    let ascii = to_ascii(value);
    let bytes = ascii.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

/// Replaces every non-printable or non-ASCII character with `_`.
pub fn to_ascii(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect()
}

/// Parses an integer header field. The field name is only used for the error.
pub fn parse_int(s: &str, field: &str) -> EdfResult<i64> {
    let s = s.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    s.parse::<i64>()
        .map_err(|_| EdfError::InvalidFormat(format!("{} is not an integer: '{}'", field, s)))
}

/// Parses a floating-point header field (EDF always uses '.' as separator).
pub fn parse_float(s: &str, field: &str) -> EdfResult<f64> {
    let s = s.trim();
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EdfError::InvalidFormat(format!("{} is not a number: '{}'", field, s)))
}

/// Parses an EDF time string into 100 ns units.
pub fn parse_edf_time(s: &str) -> EdfResult<i64> {
    let s = s.trim();

    if s.is_empty() {
        return Err(EdfError::InvalidFormat("Empty time string".to_string()));
    }

    let (negative, s) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    let (integer_part, decimal_part) = match s.find('.') {
        Some(dot_pos) => (&s[..dot_pos], &s[dot_pos + 1..]),
        None => (s, ""),
    };

    if integer_part.is_empty() && decimal_part.is_empty() {
        return Err(EdfError::InvalidFormat(format!("Invalid time string '{}'", s)));
    }
    if !integer_part.bytes().all(|b| b.is_ascii_digit())
        || !decimal_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(EdfError::InvalidFormat(format!("Invalid time string '{}'", s)));
    }

    let out_of_range = || EdfError::InvalidFormat(format!("Time '{}' out of range", s));

    let mut value = 0i64;
    if !integer_part.is_empty() {
        value = integer_part.parse::<i64>()
            .map_err(|_| out_of_range())?
            .checked_mul(TIME_DIMENSION)
            .ok_or_else(out_of_range)?;
    }

    // at most 7 decimals fit the 100 ns resolution
    if !decimal_part.is_empty() {
        let decimal_str = &decimal_part[..decimal_part.len().min(7)];
        let decimal_value = decimal_str.parse::<i64>()
            .map_err(|_| EdfError::InvalidFormat("Invalid decimal part".to_string()))?;
        value = value
            .checked_add(decimal_value * 10i64.pow(7 - decimal_str.len() as u32))
            .ok_or_else(out_of_range)?;
    }

    Ok(if negative { -value } else { value })
}

/// Formats a 100 ns tick count as seconds with trailing zeros removed.
pub fn format_edf_time(ticks: i64) -> String {
    let sign = if ticks < 0 { "-" } else { "" };
    let abs = ticks.unsigned_abs();
    let dimension = TIME_DIMENSION as u64;
    let whole = abs / dimension;
    let fraction = abs % dimension;
    if fraction == 0 {
        format!("{}{}", sign, whole)
    } else {
        let digits = format!("{:07}", fraction);
        format!("{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}

/// Formats a number so that it fits an 8-character header field.
pub fn format_edf_number(value: f64) -> String {
    let mut text = format!("{}", value);
    if text.len() > 8 {
        for precision in (0..8).rev() {
            text = format!("{:.*}", precision, value);
            if text.len() <= 8 {
                break;
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_edf_time() {
        assert_eq!(parse_edf_time("1").unwrap(), 10_000_000);
        assert_eq!(parse_edf_time("1.5").unwrap(), 15_000_000);
        assert_eq!(parse_edf_time("-2.5").unwrap(), -25_000_000);
        assert_eq!(parse_edf_time("+0.0000001").unwrap(), 1);
        assert_eq!(parse_edf_time(".5").unwrap(), 5_000_000);
        assert!(parse_edf_time("").is_err());
        assert!(parse_edf_time("1.x").is_err());
    }

    #[test]
    fn test_parse_edf_time_out_of_range() {
        // 922337203685 s is the largest whole-second value in 100 ns ticks
        assert_eq!(parse_edf_time("922337203685").unwrap(), 922_337_203_685 * TIME_DIMENSION);
        assert!(matches!(parse_edf_time("+99999999999999"), Err(EdfError::InvalidFormat(_))));
        assert!(matches!(parse_edf_time("99999999999999999999"), Err(EdfError::InvalidFormat(_))));
        assert!(parse_edf_time("922337203685.4775808").is_err());
    }

    #[test]
    fn test_format_edf_time() {
        assert_eq!(format_edf_time(0), "0");
        assert_eq!(format_edf_time(20 * TIME_DIMENSION), "20");
        assert_eq!(format_edf_time(15_000_000), "1.5");
        assert_eq!(format_edf_time(1), "0.0000001");
        assert_eq!(format_edf_time(-25_000_000), "-2.5");
    }

    #[test]
    fn test_fields() {
        let mut field = [0u8; 8];
        write_field(&mut field, "Привет");
        assert_eq!(&field, b"______  ");
        write_field(&mut field, "0123456789");
        assert_eq!(&field, b"01234567");
        assert_eq!(read_field(b"  42    "), "42");
        assert_eq!(parse_int(" +42 ", "n").unwrap(), 42);
        assert!(parse_int("4x", "n").is_err());
        assert_eq!(parse_float("-3276.8", "n").unwrap(), -3276.8);
    }

    #[test]
    fn test_format_edf_number_fits() {
        assert_eq!(format_edf_number(-200.0), "-200");
        assert_eq!(format_edf_number(0.1), "0.1");
        assert!(format_edf_number(1.0 / 3.0).len() <= 8);
        assert!(format_edf_number(-12345.678901).len() <= 8);
    }
}
