//! Color tables for radar data visualization.
//!
//! A color table maps decoded moment values to RGBA colors by threshold
//! level and carries a reserved color for range-folded bins. The sweep view
//! bakes a table into a raw-word lookup table sized to the product's data
//! range.

/// An RGBA color.
pub type Rgba = [u8; 4];

/// A single level in a color table: values at or above this threshold (but
/// below the next higher threshold) take this color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTableLevel {
    value: f32,
    color: Rgba,
}

impl ColorTableLevel {
    /// Creates a new color table level.
    pub fn new(value: f32, color: Rgba) -> Self {
        Self { value, color }
    }
}

/// A discrete color table with a reserved range-folded color.
///
/// Levels are sorted from highest to lowest threshold during construction;
/// lookup returns the color of the highest threshold the value reaches.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    levels: Vec<ColorTableLevel>,
    rf_color: Rgba,
}

impl ColorTable {
    /// Creates a new color table from the given levels and range-folded
    /// color.
    pub fn new(mut levels: Vec<ColorTableLevel>, rf_color: Rgba) -> Self {
        levels.sort_by(|a, b| b.value.total_cmp(&a.value));
        Self { levels, rf_color }
    }

    /// Whether the table has any levels to look up.
    pub fn is_valid(&self) -> bool {
        !self.levels.is_empty()
    }

    /// The reserved color for range-folded bins.
    pub fn rf_color(&self) -> Rgba {
        self.rf_color
    }

    /// Returns the color for the given decoded value: the color of the
    /// highest threshold the value reaches, or the lowest level's color for
    /// values below all thresholds.
    pub fn color(&self, value: f32) -> Rgba {
        let mut color = [0, 0, 0, 0];

        for level in &self.levels {
            if value >= level.value {
                return level.color;
            }

            color = level.color;
        }

        color
    }
}

/// A basic reflectivity color table covering the standard dBZ levels.
pub fn default_reflectivity_table() -> ColorTable {
    ColorTable::new(
        vec![
            ColorTableLevel::new(5.0, [0, 236, 236, 255]),
            ColorTableLevel::new(10.0, [1, 160, 246, 255]),
            ColorTableLevel::new(15.0, [0, 0, 246, 255]),
            ColorTableLevel::new(20.0, [0, 255, 0, 255]),
            ColorTableLevel::new(25.0, [0, 200, 0, 255]),
            ColorTableLevel::new(30.0, [0, 144, 0, 255]),
            ColorTableLevel::new(35.0, [255, 255, 0, 255]),
            ColorTableLevel::new(40.0, [231, 192, 0, 255]),
            ColorTableLevel::new(45.0, [255, 144, 0, 255]),
            ColorTableLevel::new(50.0, [255, 0, 0, 255]),
            ColorTableLevel::new(55.0, [214, 0, 0, 255]),
            ColorTableLevel::new(60.0, [192, 0, 0, 255]),
            ColorTableLevel::new(65.0, [255, 0, 255, 255]),
            ColorTableLevel::new(70.0, [153, 85, 201, 255]),
            ColorTableLevel::new(75.0, [235, 235, 235, 255]),
        ],
        [119, 0, 125, 255],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_selects_highest_reached_threshold() {
        let table = ColorTable::new(
            vec![
                ColorTableLevel::new(0.0, [0, 0, 0, 255]),
                ColorTableLevel::new(30.0, [0, 255, 0, 255]),
                ColorTableLevel::new(50.0, [255, 0, 0, 255]),
            ],
            [119, 0, 125, 255],
        );

        assert_eq!(table.color(55.0), [255, 0, 0, 255]);
        assert_eq!(table.color(35.0), [0, 255, 0, 255]);
        assert_eq!(table.color(10.0), [0, 0, 0, 255]);
        // Below all thresholds takes the lowest level's color
        assert_eq!(table.color(-10.0), [0, 0, 0, 255]);
    }

    #[test]
    fn empty_table_is_invalid() {
        let table = ColorTable::new(Vec::new(), [0, 0, 0, 0]);
        assert!(!table.is_valid());
        assert!(default_reflectivity_table().is_valid());
    }
}
