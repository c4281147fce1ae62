//! Celestial-sphere geometry and coordinate parsing.

pub mod sexagesimal;
pub mod sphere;

pub use sexagesimal::{CoordinateFormat, parse_coordinate};
pub use sphere::SkyPosition;
