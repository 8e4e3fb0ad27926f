pub mod broker;
pub mod cluster;
pub mod health;
pub mod recorder;
pub mod scheduler;

use serde::Deserialize;

/// 分页查询参数，缺省为第 1 页每页 10 条
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(10)
    }
}
