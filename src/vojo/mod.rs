pub mod base_response;
pub mod create_datasource_req;
pub mod create_migration_task_req;
pub mod datasource_res;
pub mod page_req;
pub mod task_progress_res;
pub mod test_connection_res;
pub mod update_datasource_req;
pub mod update_migration_task_req;
