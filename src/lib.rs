//! FBX scene graph to p3d model converter.
//!
//! A parsed scene ([`scene::Scene`]) is turned into a renderer-ready
//! [`model::Model`]: welded interleaved vertex buffers, draw partitions with a
//! bounded bone count, resolved materials and compressed animation tracks.
//! [`writer`] serializes the result as JSON or UBJSON.

pub mod convert;
pub mod error;
pub mod logging;
pub mod math;
pub mod model;
pub mod scene;
pub mod settings;
pub mod writer;

pub use convert::{
    Conversion, ConversionIssue, ConversionReport, ConvertOptions, OutputFormat, Severity,
    convert_file, convert_scene,
};
pub use error::ConvertError;
