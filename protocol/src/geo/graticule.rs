//! One-degree grid cells around a reference point.
//!
//! Map front ends draw the 3x3 block of cells surrounding the reference with
//! the reference's own cell highlighted, so a user can see where a derived
//! coordinate is allowed to land. Cell origins use `floor`, unlike the
//! deriver's truncation, so for negative references the highlighted cell is
//! the one containing the reference, not the derived point.

use serde::{Deserialize, Serialize};

use super::coordinate::Coordinate;

/// Cells on each side of the centre cell.
const RADIUS: i64 = 1;

/// An axis-aligned one-degree cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraticuleCell {
    /// South-west corner.
    pub south_west: Coordinate,
    /// North-east corner.
    pub north_east: Coordinate,
    /// True for the cell containing the reference point.
    pub active: bool,
}

impl GraticuleCell {
    /// Whether `point` lies inside the cell (edges inclusive).
    pub fn contains(&self, point: Coordinate) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }
}

/// The nine cells around `reference`, row-major from the north-east.
pub fn graticule(reference: Coordinate) -> Vec<GraticuleCell> {
    let x = reference.lat.floor();
    let y = reference.lng.floor();

    let mut cells = Vec::with_capacity(9);
    for i in -RADIUS..=RADIUS {
        for j in -RADIUS..=RADIUS {
            let lat = x - i as f64;
            let lng = y - j as f64;
            cells.push(GraticuleCell {
                south_west: Coordinate::new(lat, lng),
                north_east: Coordinate::new(lat + 1.0, lng + 1.0),
                active: i == 0 && j == 0,
            });
        }
    }
    cells
}
