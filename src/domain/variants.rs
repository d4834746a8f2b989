//! Variant consolidation.
//!
//! Admins submit free-form (color, size, quantity) tuples; storage holds at
//! most one row per (color, size) key. Duplicate submissions are summed, and
//! the no-color spellings ("", "   ", absent) all collapse onto one key.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ApiError;

/// One variant tuple as submitted by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantInput {
    #[serde(default)]
    pub color: Option<String>,
    pub size: String,
    pub quantity: i32,
}

/// A consolidated row ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedVariant {
    pub color: Option<String>,
    pub size: String,
    pub quantity: i32,
}

/// Empty and all-whitespace colors mean "no color", stored as NULL so the
/// different spellings can never form distinct keys.
pub fn normalize_color(color: Option<&str>) -> Option<String> {
    let trimmed = color?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Groups submissions by (size, normalized color) and sums quantities for
/// duplicate keys. Output is ordered by key, so any permutation of the same
/// input produces the same rows. Rejects negative quantities and blank sizes
/// before any write happens.
pub fn consolidate(inputs: &[VariantInput]) -> Result<Vec<ConsolidatedVariant>, ApiError> {
    let mut grouped: BTreeMap<(String, Option<String>), i64> = BTreeMap::new();
    for input in inputs {
        if input.quantity < 0 {
            return Err(ApiError::Validation(format!(
                "Variant quantity must be non-negative, got {}",
                input.quantity
            )));
        }
        let size = input.size.trim();
        if size.is_empty() {
            return Err(ApiError::Validation("Variant size is required".into()));
        }
        let key = (size.to_string(), normalize_color(input.color.as_deref()));
        *grouped.entry(key).or_insert(0) += i64::from(input.quantity);
    }

    grouped
        .into_iter()
        .map(|((size, color), quantity)| {
            let quantity = i32::try_from(quantity).map_err(|_| {
                ApiError::Validation(format!("Variant quantity for size {size} overflows"))
            })?;
            Ok(ConsolidatedVariant { color, size, quantity })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(color: Option<&str>, size: &str, quantity: i32) -> VariantInput {
        VariantInput {
            color: color.map(str::to_string),
            size: size.to_string(),
            quantity,
        }
    }

    #[test]
    fn duplicate_keys_are_summed() {
        let rows = consolidate(&[
            input(Some("red"), "M", 3),
            input(Some("red"), "M", 2),
            input(Some("blue"), "L", 1),
        ])
        .unwrap();

        assert_eq!(rows.len(), 2);
        let red_m = rows.iter().find(|r| r.size == "M").unwrap();
        assert_eq!(red_m.color.as_deref(), Some("red"));
        assert_eq!(red_m.quantity, 5);
        let blue_l = rows.iter().find(|r| r.size == "L").unwrap();
        assert_eq!(blue_l.quantity, 1);
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let forward = consolidate(&[
            input(Some("red"), "M", 3),
            input(Some("red"), "M", 2),
            input(Some("blue"), "L", 1),
        ])
        .unwrap();
        let shuffled = consolidate(&[
            input(Some("blue"), "L", 1),
            input(Some("red"), "M", 2),
            input(Some("red"), "M", 3),
        ])
        .unwrap();
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn empty_and_absent_colors_share_one_key() {
        let rows = consolidate(&[
            input(Some(""), "M", 2),
            input(None, "M", 3),
            input(Some("   "), "M", 1),
        ])
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].color, None);
        assert_eq!(rows[0].quantity, 6);
    }

    #[test]
    fn color_whitespace_is_trimmed_before_keying() {
        let rows = consolidate(&[input(Some(" red "), "M", 1), input(Some("red"), "M", 1)]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].color.as_deref(), Some("red"));
        assert_eq!(rows[0].quantity, 2);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let err = consolidate(&[input(None, "M", -1)]).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn blank_size_is_rejected() {
        assert!(consolidate(&[input(None, "  ", 1)]).is_err());
    }

    #[test]
    fn summed_quantity_overflow_is_rejected() {
        let err = consolidate(&[input(None, "M", i32::MAX), input(None, "M", 1)]).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(consolidate(&[]).unwrap().is_empty());
    }
}
