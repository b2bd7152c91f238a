//! Data models shared by the signature, watermark and overlay pipelines.

pub mod config;
pub mod document;
pub mod placement;

pub use config::{InksealConfig, ModelConfig, OutputConfig, SegmenterKind, SignatureConfig, WatermarkConfig};
pub use document::{DocumentDescriptor, DocumentKind};
pub use placement::{PageSelection, PlacementSpec};
