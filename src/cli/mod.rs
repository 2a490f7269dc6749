pub mod get;
pub mod info;
pub mod list;
pub mod put;
pub mod remove;
pub mod sync;

pub use get::*;
pub use info::*;
pub use list::*;
pub use put::*;
pub use remove::*;
pub use sync::*;

use std::path::Path;

/// `-` stands for stdin or stdout
pub(crate) fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}
