pub mod detect;
pub mod view;

pub use detect::handle_detect;
pub use view::handle_view;
