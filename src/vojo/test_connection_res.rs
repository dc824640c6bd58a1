use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct TestConnectionRes {
    pub connected: bool,
}
