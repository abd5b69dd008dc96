pub mod filesystem;
pub mod hashing;
pub mod parser;
pub mod symbols;
pub mod syntax;
