/// Logical room names (§4.E "Connection lifecycle"/"Subscription").
pub fn room_user(user_id: &str) -> String {
	format!("user:{user_id}")
}

pub fn room_instance(instance_id: &str) -> String {
	format!("instance:{instance_id}")
}

pub fn room_key(user_id: &str, key: &str) -> String {
	format!("key:{user_id}:{key}")
}
