pub mod about;
pub mod addon;
pub mod asset;
pub mod category;
pub mod ordering;
pub mod service;
pub mod settings;
pub mod shared;
pub mod slider;
pub mod testimonial;
pub mod gallery;
