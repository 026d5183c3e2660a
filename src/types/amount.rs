// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Fixed-point money amount with two fractional digits.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{AMOUNT_FRAC_DIGITS, AMOUNT_SCALE};
use crate::error::KernelError;

/// Raw value is in minor units (hundredths).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Amount(pub i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(AMOUNT_SCALE).map(Amount)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl FromStr for Amount {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (whole, frac) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(KernelError::InvalidAmount);
        }
        if frac.len() > AMOUNT_FRAC_DIGITS as usize {
            return Err(KernelError::InvalidAmount);
        }
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(KernelError::InvalidAmount);
        }

        let mut units: i64 = 0;
        for b in whole.bytes() {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add(i64::from(b - b'0')))
                .ok_or(KernelError::InvalidAmount)?;
        }
        let mut minor = units.checked_mul(AMOUNT_SCALE).ok_or(KernelError::InvalidAmount)?;

        // "1.5" means fifty hundredths
        let mut place = AMOUNT_SCALE / 10;
        for b in frac.bytes() {
            minor = minor
                .checked_add(i64::from(b - b'0') * place)
                .ok_or(KernelError::InvalidAmount)?;
            place /= 10;
        }

        Ok(Amount(if negative { -minor } else { minor }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = AMOUNT_SCALE as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / scale,
            abs % scale,
            width = AMOUNT_FRAC_DIGITS as usize
        )
    }
}
