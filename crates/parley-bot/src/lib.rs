pub mod config;
pub mod error;
pub mod images;
pub mod locks;
pub mod conversation;
pub mod dispatcher;
pub mod slack;
pub mod state;
