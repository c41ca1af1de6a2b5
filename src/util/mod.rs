pub mod mem_watcher;

pub use mem_watcher::MemoryWatcher;
