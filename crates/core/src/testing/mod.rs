//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every backend trait, so
//! batches can be driven end to end without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use conversio_core::testing::{fixtures, MemorySink, MockConversionService};
//!
//! let service = Arc::new(MockConversionService::new());
//! service.never_finish("slow.docx");
//!
//! let sink = Arc::new(MemorySink::new());
//! // Build a ConversionOrchestrator with a Remote backend...
//! ```

mod memory_sink;
mod mock_direct;
mod mock_engine;
pub mod mock_service;

pub use memory_sink::MemorySink;
pub use mock_direct::{DirectCall, MockDirectService};
pub use mock_engine::{MockEngine, MockEngineRuntime};
pub use mock_service::MockConversionService;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::SourceFile;

    /// An office document with a few bytes of content.
    pub fn document(name: &str) -> SourceFile {
        SourceFile::new(
            name,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            format!("document:{}", name).into_bytes(),
        )
    }

    pub fn image(name: &str) -> SourceFile {
        SourceFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    pub fn video(name: &str) -> SourceFile {
        SourceFile::new(name, "video/quicktime", vec![0u8; 32])
    }

    pub fn audio(name: &str) -> SourceFile {
        SourceFile::new(name, "audio/wav", vec![0u8; 32])
    }

    /// `count` documents named `file-1.docx`, `file-2.docx`, ...
    pub fn documents(count: usize) -> Vec<SourceFile> {
        (1..=count)
            .map(|i| document(&format!("file-{}.docx", i)))
            .collect()
    }
}
