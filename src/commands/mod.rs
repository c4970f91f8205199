//! CLI 命令实现

pub mod generate;
pub mod serve;

pub use generate::{generate_command, GenerateOptions};
pub use serve::serve_command;
pub use test::test_command;
