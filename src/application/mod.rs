pub mod backlog;
pub mod board;
pub mod bootstrap;
pub mod commands;
pub mod library;
