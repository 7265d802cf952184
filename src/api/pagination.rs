use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub category: Option<Uuid>,
    pub seller: Option<Uuid>,
    pub search: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn per_page(&self) -> u32 { self.per_page.unwrap_or(20).clamp(1, 100) }
    pub fn limit(&self) -> i64 { i64::from(self.per_page()) }
    pub fn offset(&self) -> i64 { i64::from(self.page() - 1) * self.limit() }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self { data, total, page: params.page(), per_page: params.per_page() }
    }
}
