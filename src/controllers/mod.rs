pub mod carts;
pub mod queue;
pub mod seats;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(seats::routes())
        .merge(carts::routes())
        .merge(queue::routes())
}
