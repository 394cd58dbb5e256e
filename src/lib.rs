pub mod agent;
pub mod cli;
pub mod coverage;
pub mod errors;
pub mod parser;
pub mod runner;
pub mod runtime;
pub mod utils;
pub mod validator;
