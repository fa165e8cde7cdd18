//! Binary persistence for maps.

use std::fs;
use std::path::Path;

use pcl_core::errors::{ErrorInfo, PclError};

use crate::map::Map;

/// Writes `map` to `path` using bincode.
pub fn write_map(map: &Map, path: &Path) -> Result<(), PclError> {
    let bytes = bincode::serialize(map).map_err(|err| PclError::serde("map-encode", err))?;
    fs::write(path, bytes).map_err(|err| {
        PclError::Serde(
            ErrorInfo::new("map-write", err.to_string()).with_context("path", path.display()),
        )
    })
}

/// Reads a map previously stored with [`write_map`] and re-validates its shape.
pub fn read_map(path: &Path) -> Result<Map, PclError> {
    let bytes = fs::read(path).map_err(|err| {
        PclError::Serde(
            ErrorInfo::new("map-read", err.to_string()).with_context("path", path.display()),
        )
    })?;
    let map: Map = bincode::deserialize(&bytes).map_err(|err| PclError::serde("map-decode", err))?;
    let pixelization = *map.pixelization();
    Map::from_components(pixelization, map.into_components())
}
