//! # jar-inliner
//!
//! Inlines Java archives into a single jar. Classes and resources of inlined archives
//! move under a package prefix, and every reference to them is rewritten: class file
//! constant pools, generic signatures, class-shaped string constants, service
//! descriptors and resource paths.
//!
//! ## Architecture
//!
//! - **names**: Binary-name, path and package helpers
//! - **trie**: Segment-keyed prefix trie used for rename lookups
//! - **rename**: Relocation rules (`com.acme` -> `vendored.com.acme`)
//! - **resource**: Immutable class path resources with lazily loaded content
//! - **element**: Class path elements (jars or directories) and their registration
//! - **remap_index**: Build-once index of which archive owns which path
//! - **remapper**: Symbol mapping over the index, with the string heuristic
//! - **classfile**: Constant pool remapping for `.class` files, over krakatau2
//! - **signature**: Descriptor and generic signature rewriting
//! - **pipeline**: Three-sweep chain of stages (pre-scan, scan, process)
//! - **stages**: The standard stages and the optional stage registry
//! - **transform**: Orchestration, summaries and the sink contract
//! - **sink**: Zip and in-memory output sinks
//! - **config**: JSON configuration merged with command-line flags
//! - **cli**: Command-line definition

pub mod classfile;
pub mod cli;
pub mod config;
pub mod element;
pub mod error;
pub mod names;
pub mod pipeline;
pub mod remap_index;
pub mod remapper;
pub mod rename;
pub mod resource;
pub mod signature;
pub mod sink;
pub mod stages;
pub mod transform;
pub mod trie;

pub use element::{ClassPath, ElementSpec};
pub use error::{Error, Result};
pub use rename::Rename;
pub use sink::{MemorySink, ZipSink};
pub use transform::{TransformOptions, TransformSummary, Transformer};
