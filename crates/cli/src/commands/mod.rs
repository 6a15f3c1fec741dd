pub mod prompt;
pub mod repl;
