pub mod orders;
pub mod products;
pub mod system;
pub mod webhooks;

use serde::Deserialize;

/// `page` and `size` query parameters shared by the search endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub size: Option<usize>,
}
