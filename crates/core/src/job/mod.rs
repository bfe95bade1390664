//! Conversion jobs and the values they carry.

mod options;
mod types;

pub use options::{ConversionOptions, OptionValue, TargetFormat};
pub use types::{
    output_file_name, CompletedRecord, ConversionRequest, FileSummary, Job, JobStatus,
    RecordStatus, SourceFile,
};
