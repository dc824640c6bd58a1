pub mod ferry_config;
