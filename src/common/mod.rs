pub mod access_log_layer;
pub mod app_error;
pub mod app_state;
pub mod common_constants;
pub mod init;
pub mod make_span;
pub mod sql_connections;
#[cfg(test)]
pub mod test_support;
