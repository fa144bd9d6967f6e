//! Data Transfer Objects

pub mod notification;
pub mod response;
