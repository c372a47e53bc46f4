/// The three read-only query shapes of §4.B.
#[derive(Debug, Clone)]
pub enum Query {
	GetItem { user_id: String, key: String },
	GetAllItems { user_id: String, prefix: Option<String> },
	GetKeys { user_id: String, prefix: Option<String> },
}
