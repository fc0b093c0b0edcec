//! Core onboarding logic

pub mod controller;
pub mod error;
pub mod scanner;
pub mod session;
pub mod types;
