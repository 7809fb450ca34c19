pub mod encoder;
pub mod preprocess;

pub use encoder::{Assembler, AsmError, SegmentId};
pub use preprocess::{PreprocessError, Preprocessor};
