pub mod migration_executor;
#[macro_export]
macro_rules! record_error {
    ($result:expr) => {
        if let Err(e) = $result {
            error!("{}", e)
        }
    };
}
