//! Kubernetes resource quantities
//!
//! Class hardware and policy fields carry quantities such as `"500m"`,
//! `"2"`, `"4Gi"` or `"1e3"`. They are parsed into an exact decimal/binary
//! representation so that unit conversion never suffers float rounding.

use crate::error::ControllerError;

const BYTES_PER_MB: i128 = 1024 * 1024;

/// `digits * 10^exp10 * 2^exp2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    digits: i128,
    exp10: i32,
    exp2: u32,
}

impl Quantity {
    pub const ZERO: Quantity = Quantity { digits: 0, exp10: 0, exp2: 0 };

    pub fn is_zero(&self) -> bool {
        self.digits == 0
    }

    /// Value in base units, rounded up.
    pub fn value(&self) -> Option<i64> {
        self.ceil_scaled(1, 1)
    }

    /// Value in thousandths of the base unit, rounded up.
    pub fn milli_value(&self) -> Option<i64> {
        self.ceil_scaled(1000, 1)
    }

    fn ceil_scaled(&self, numerator: i128, denominator: i128) -> Option<i64> {
        let mut num = self
            .digits
            .checked_mul(numerator)?
            .checked_mul(2i128.checked_pow(self.exp2)?)?;
        let mut den = denominator;
        if self.exp10 >= 0 {
            num = num.checked_mul(10i128.checked_pow(self.exp10.unsigned_abs())?)?;
        } else {
            den = den.checked_mul(10i128.checked_pow(self.exp10.unsigned_abs())?)?;
        }
        i64::try_from(ceil_div(num, den)).ok()
    }
}

fn ceil_div(num: i128, den: i128) -> i128 {
    let quotient = num.div_euclid(den);
    if num.rem_euclid(den) == 0 { quotient } else { quotient + 1 }
}

/// Parse a quantity. The empty string is zero.
pub fn parse_quantity(input: &str) -> Result<Quantity, ControllerError> {
    let invalid = |reason: &str| ControllerError::InvalidQuantity(input.to_string(), reason.to_string());

    let s = input.trim();
    if s.is_empty() {
        return Ok(Quantity::ZERO);
    }

    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let number_end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_end);
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid("missing number"));
    }
    if frac_part.contains('.') {
        return Err(invalid("more than one decimal point"));
    }

    let mut digits: i128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        digits = digits
            .checked_mul(10)
            .and_then(|d| d.checked_add(i128::from(b - b'0')))
            .ok_or_else(|| invalid("too many digits"))?;
    }
    if negative && digits != 0 {
        return Err(invalid("negative quantity"));
    }

    let frac_len = i32::try_from(frac_part.len()).map_err(|_| invalid("too many digits"))?;
    let (exp10, exp2) = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        exp if exp.starts_with(['e', 'E']) => {
            let e = exp[1..].parse::<i32>().map_err(|_| invalid("malformed exponent"))?;
            (e, 0)
        }
        _ => return Err(invalid("unknown suffix")),
    };

    let exp10 = exp10
        .checked_sub(frac_len)
        .ok_or_else(|| invalid("exponent out of range"))?;
    Ok(Quantity { digits, exp10, exp2 })
}

/// CPU quantity in MHz: milli-cores times the cluster's minimum host
/// frequency, rounded up.
pub fn cpu_quantity_to_mhz(quantity: &Quantity, min_freq_mhz: u64) -> Result<i64, ControllerError> {
    let overflow = || ControllerError::InvalidQuantity(format!("{quantity:?}"), "out of range".to_string());
    let milli = quantity.milli_value().ok_or_else(overflow)?;
    let mhz = ceil_div(i128::from(milli) * i128::from(min_freq_mhz), 1000);
    i64::try_from(mhz).map_err(|_| overflow())
}

/// Memory quantity in MB (2^20 bytes), rounded up.
pub fn memory_quantity_to_mb(quantity: &Quantity) -> Result<i64, ControllerError> {
    let overflow = || ControllerError::InvalidQuantity(format!("{quantity:?}"), "out of range".to_string());
    let bytes = quantity.value().ok_or_else(overflow)?;
    i64::try_from(ceil_div(i128::from(bytes), BYTES_PER_MB)).map_err(|_| overflow())
}
