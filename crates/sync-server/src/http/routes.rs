use crate::http::handlers::{conflicts, items};
use crate::state::SharedState;
use axum::routing::{delete, get, post, put};
use axum::Router;

/// The `/api/v1/sync-storage` surface (spec §6). Mounted under
/// `admission_middleware`/`metrics_middleware` by `crate::serve`.
pub fn routes() -> Router<SharedState> {
	Router::new()
		.route("/item/:key", get(items::get_item).put(items::put_item).delete(items::delete_item))
		.route("/items", get(items::list_items))
		.route("/keys", get(items::list_keys))
		.route("/clear", delete(items::clear))
		.route("/conflicts/history/:item_id", get(conflicts::history))
		.route("/conflicts/stats", get(conflicts::stats))
		.route("/conflicts/resolve/:conflict_id", put(conflicts::resolve))
		.route("/conflicts/analyze", post(conflicts::analyze))
		.route("/conflicts/strategies", get(conflicts::strategies))
}
