pub mod config_file;
pub mod fd_limit;
pub mod logger;

pub use fd_limit::{max_open_fds, max_workers_by_fd_limit, FDS_PER_WORKER};
pub use logger::setup_logging;
pub use config_file::{apply_file_to_opts, load_dupcat_toml};
