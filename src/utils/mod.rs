pub mod cli;
pub mod repo_identifier;
pub mod session;
pub mod state;
pub mod validation;
