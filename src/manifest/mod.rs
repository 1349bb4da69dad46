//! API manifest handling.
//!
//! A manifest declares the requests an API exposes and the shapes of their
//! arguments and results. Three concerns, three modules:
//!
//! - [`types`] - the serde data model (JSON and YAML share it).
//! - [`validator`] - parse, structural validation, multi-file merge,
//!   serialization. All-or-nothing.
//! - [`runtime`] - value validation against the definitions, accumulating
//!   every violation.

pub mod runtime;
pub mod types;
pub mod validator;

pub use runtime::{ValidationReport, ValueValidator, Violation};
pub use types::{ArgumentDef, ArgumentType, Manifest, ModelDef, RequestDef};
pub use validator::{
    merge_files, parse, parse_file, serialize, validate_structure, ManifestFormat,
    MAX_EXTENDS_DEPTH, RESERVED_REQUEST_NAMES,
};
