/*!
Miscellaneous utilities for `fixburn`
*/

use crate::CpuFloat;
use chrono::Duration;
use itertools::Itertools;
use std::fmt::Display;
use std::str::FromStr;

/// Format values separated by single spaces
pub fn join_values<T: Display>(values: &[T]) -> String {
    values.iter().join(" ")
}

/// Parse values separated by commas and/or whitespace
pub fn parse_values<F: FromStr>(text: &str) -> Result<Vec<F>, F::Err> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .map(F::from_str)
        .collect()
}

/// Convert a `chrono::Duration` to a number of seconds
pub fn to_s(dur: Duration) -> CpuFloat {
    match dur.num_nanoseconds() {
        Some(ns) => ns as CpuFloat / 1e9,
        None => dur.num_milliseconds() as CpuFloat / 1e3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_s() {
        assert_eq!(to_s(Duration::minutes(1)), 60.0);
        assert_eq!(to_s(Duration::milliseconds(1500)), 1.5);
        assert_eq!(to_s(Duration::days(400_000)), 400_000.0 * 60.0 * 60.0 * 24.0);
    }

    #[test]
    fn value_lists() {
        assert_eq!(join_values(&[1.5, -2.0, 3.25]), "1.5 -2 3.25");
        assert_eq!(join_values::<f64>(&[]), "");
        assert_eq!(parse_values::<f64>(" 1.5, 2\t-3 ").unwrap(), vec![1.5, 2.0, -3.0]);
        assert!(parse_values::<f64>("1 two").is_err());
    }
}
