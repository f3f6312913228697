pub mod footer;
pub mod header;
pub mod utils;

pub use footer::{draw_footer, StatusLevel};
pub use header::draw_header;
pub use utils::{format_size, format_time, status_color, truncate};
