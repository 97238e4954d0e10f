pub mod diagnostics;
pub mod range;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticLevel};
pub use range::{Pos, Range, SourceFile};
pub use value::{ConversionError, FromValue, Value};
