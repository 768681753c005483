//! Typed physical quantities used at the API boundary.
//!
//! The numeric core works on canonical `f64` values (seconds, millivolts, hertz); these
//! wrappers make the unit of every configuration value explicit at construction time.
use std::fmt;

use serde::{Deserialize, Serialize};

/// A time quantity, stored in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Time(f64);

impl Time {
    /// A time given in seconds.
    pub fn s(value: f64) -> Self {
        Time(value)
    }

    /// A time given in milliseconds.
    pub fn ms(value: f64) -> Self {
        Time(value * 1e-3)
    }

    /// The value in seconds.
    pub fn as_s(&self) -> f64 {
        self.0
    }

    /// The value in milliseconds.
    pub fn as_ms(&self) -> f64 {
        self.0 * 1e3
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} s", self.0)
    }
}

/// A membrane potential quantity, stored in millivolts (relative to the resting potential).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Voltage(f64);

impl Voltage {
    /// A potential given in millivolts.
    pub fn mv(value: f64) -> Self {
        Voltage(value)
    }

    /// The value in millivolts.
    pub fn as_mv(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} mV", self.0)
    }
}

/// A firing-rate quantity, stored in hertz.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Rate(f64);

impl Rate {
    /// A rate given in hertz.
    pub fn hz(value: f64) -> Self {
        Rate(value)
    }

    /// The value in hertz.
    pub fn as_hz(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_time_conversions() {
        assert_relative_eq!(Time::ms(10.0).as_s(), 0.01, epsilon = 1e-15);
        assert_relative_eq!(Time::s(0.002).as_ms(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_serde_round_trip() {
        let tau = Time::ms(10.0);
        let json = serde_json::to_string(&tau).unwrap();
        let back: Time = serde_json::from_str(&json).unwrap();
        assert_eq!(tau, back);
    }
}
