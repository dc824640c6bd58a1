pub mod datasource_dao;
pub mod migration_task_dao;
