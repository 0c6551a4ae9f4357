// Core utilities shared by services

pub mod slug;

pub use slug::slugify;
