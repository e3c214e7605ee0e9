pub mod csv_data;
pub mod file_config;
pub mod memory_cache;
