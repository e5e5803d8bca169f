pub mod controller;
pub mod job;
pub mod manifest;
pub mod package;
