// Tue Oct 13 2026 - Alex

pub mod error;
pub mod eval;
pub mod include;
pub mod macros;
pub mod preprocessor;
pub mod scanner;
pub mod token;

pub use error::{EvalError, LexError, PreprocessError};
pub use eval::evaluate;
pub use include::{IncludeFile, IncludeKind, IncludeResolver, MemoryIncludes, SearchPathIncludes};
pub use macros::{Expander, MacroDefinition, MacroTable};
pub use preprocessor::{preprocess_all, ConditionalPolicy, Preprocessor, PreprocessorOptions};
pub use scanner::{tokenize, Scanner};
pub use token::{spell, SourcePos, Token, TokenKind};
