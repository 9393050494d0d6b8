pub mod justified;

pub use justified::JustifiedLayout;
