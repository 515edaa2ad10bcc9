// Portfolio content: images, projects and the hero video, read from the table store.

pub mod handlers;
pub mod sections;
pub mod store;
