pub mod feed;
pub mod item;
pub mod lightbox;
pub mod row_model;

pub use feed::*;
pub use item::*;
pub use lightbox::*;
pub use row_model::*;
