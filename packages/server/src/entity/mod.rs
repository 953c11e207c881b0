pub mod about_block;
pub mod about_page;
pub mod asset;
pub mod category;
pub mod category_addon;
pub mod company_story;
pub mod gallery_item;
pub mod parent;
pub mod service;
pub mod service_addon;
pub mod settings;
pub mod slider;
pub mod testimonial;
