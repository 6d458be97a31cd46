pub mod analyzer;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;

pub use error::{CompileError, CompileResult};

use lexer::{Lexer, TokenStream};
use parser::Parser;

/// Compile a source program into register-machine IR text. The first
/// lexical, syntactic, or semantic error aborts the compilation. `trace`
/// logs grammar productions, consumed tokens, and the symbol table to
/// standard error.
pub fn compile(source: &str, trace: bool) -> CompileResult<String> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser::new(TokenStream::new(tokens)).with_trace(trace);
    parser.parse_program()?;
    if !parser.done_with_input() {
        return Err(parser.trailing_input_error());
    }
    Ok(parser.into_ir())
}
