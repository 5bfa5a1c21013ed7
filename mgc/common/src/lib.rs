//! Common items shared by every stage of the compiler

mod compile_context;
pub mod file_provider;
mod ident;
mod input_file;
mod span;

pub use compile_context::CompileContext;
pub use ident::Ident;
pub use input_file::{Code, CodeId, InputFiles};
pub use span::Span;
