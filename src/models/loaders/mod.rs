pub mod record_loader;

pub use record_loader::{find_all_record_files, load_record};
