#![deny(missing_docs)]
#![doc = "Pixelizations, maps, binary masks and apodized windows for the pseudo-Cl estimator."]

pub mod apodization;
pub mod distance;
pub mod geometry;
pub mod io;
pub mod map;
pub mod masks;

pub use apodization::{build_window, ApodizationConfig, ApodizationKind, ApodizedWindow};
pub use distance::distance_to_mask;
pub use geometry::{angular_distance, lonlat_to_vector, CarGeometry, HealpixGeometry, Pixelization, Ring};
pub use io::{read_map, write_map};
pub use map::{Map, Window, WindowPair};
pub use masks::{disc_mask, query_disc, simulate_source_mask, SourceMaskConfig};
