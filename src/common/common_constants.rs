pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;

pub const SAMPLE_DATASOURCE_NAME: &str = "sample-sqlite";
pub const SAMPLE_DATABASE_PATH: &str = "./sample.db";
