pub mod api;
pub mod auth;
pub mod authority;
pub mod config;
pub mod course;
pub mod event;
pub mod extract;
pub mod ident;
pub mod known_errors;
pub mod lesson;
pub mod membership;
pub mod permission;
pub mod query;
pub mod role;
pub mod sample;
pub mod seed;
pub mod service;
pub mod user;

#[cfg(test)]
mod test_support;

pub type StateType = service::MemoryService;
