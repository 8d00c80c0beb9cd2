use serde::{Deserialize, Serialize};
use twinbrot_core::{INTERIOR, MAX_ESCAPE_LEVEL};

use crate::gray_field::GrayField;

/// How the escape-speed values of a finished field are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrayscaleMode {
    /// Values as computed: `round(255 * i / N)`.
    #[default]
    Absolute,
    /// Stretched so the visible escape range spans `0..=254`.
    Relative,
}

impl GrayscaleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absolute => "absolute",
            Self::Relative => "relative",
        }
    }
}

/// Stretch non-interior values to the full escape range.
///
/// Returns `false` and leaves the field untouched when there are no
/// escaping pixels or they all share one value.
pub fn apply_relative(field: &mut GrayField) -> bool {
    let (min, max) = field
        .escaped_values()
        .fold((u8::MAX, u8::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min >= max {
        return false;
    }
    let range = (max - min) as f64;
    let top = MAX_ESCAPE_LEVEL as f64;
    for v in field.data.iter_mut().filter(|v| **v != INTERIOR) {
        *v = ((*v - min) as f64 / range * top).round() as u8;
    }
    true
}

/// Apply `mode` to a fresh field and report the mode actually in effect.
pub fn post_process(field: &mut GrayField, mode: GrayscaleMode) -> GrayscaleMode {
    match mode {
        GrayscaleMode::Absolute => GrayscaleMode::Absolute,
        GrayscaleMode::Relative if apply_relative(field) => GrayscaleMode::Relative,
        GrayscaleMode::Relative => GrayscaleMode::Absolute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretches_to_full_range() {
        let mut field = GrayField::from_data(5, 1, vec![10, 20, 30, INTERIOR, 15]).unwrap();
        assert!(apply_relative(&mut field));
        assert_eq!(field.data, vec![0, 127, 254, INTERIOR, 64]);
    }

    #[test]
    fn relative_is_idempotent() {
        let mut field =
            GrayField::from_data(6, 1, vec![3, 77, 41, INTERIOR, 200, 9]).unwrap();
        assert!(apply_relative(&mut field));
        let once = field.clone();
        apply_relative(&mut field);
        assert_eq!(field, once);
    }

    #[test]
    fn degenerate_range_falls_back() {
        let mut flat = GrayField::from_data(3, 1, vec![40, 40, INTERIOR]).unwrap();
        assert!(!apply_relative(&mut flat));
        assert_eq!(flat.data, vec![40, 40, INTERIOR]);

        let mut interior = GrayField::filled(2, 2, INTERIOR);
        assert_eq!(
            post_process(&mut interior, GrayscaleMode::Relative),
            GrayscaleMode::Absolute
        );
    }

    #[test]
    fn absolute_leaves_field_alone() {
        let mut field = GrayField::from_data(3, 1, vec![1, 2, 3]).unwrap();
        assert_eq!(
            post_process(&mut field, GrayscaleMode::Absolute),
            GrayscaleMode::Absolute
        );
        assert_eq!(field.data, vec![1, 2, 3]);
    }
}
