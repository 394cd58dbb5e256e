pub mod file;
pub mod path_resolver;
pub mod process;
