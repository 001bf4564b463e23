pub mod handlers;
pub mod models;
pub mod parser;
pub mod prompt;
