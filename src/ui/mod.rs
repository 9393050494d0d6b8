pub mod grid;
pub mod row_widget;
pub mod viewer;
pub mod window;

pub use window::MainWindow;
