//! Data-layer mapping
//!
//! Host pages hand the tracker arbitrary nested objects (tag-manager data
//! layers, product payloads). This module resolves dotted paths against them
//! and flattens the result into the single-level parameters the pixel carries.

pub mod mapper;
pub mod value;

pub use mapper::{extract, flatten, map_and_flatten, Mapping};
pub use value::{number_to_string, to_fixed_2, DataValue, ParamSet, ParamValue};
