pub mod fs_json;
pub mod ids;
pub mod logging;
