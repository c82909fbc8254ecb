//! Knob records, link restoration and project documents.

mod filename;
mod knob_io;
pub mod migration;
mod project;
pub mod record;

pub use filename::legacy_filename_pattern;
pub use migration::{migrate, schema_version, CURRENT_SCHEMA_VERSION};
pub use project::{LoadIssue, LoadReport};
pub use record::{KnobRecord, MasterRecord, NodeRecord, ProjectDocument, ValueRecord};
