/// Extracts the caller's secret from the three supported locations, in
/// priority order: bearer header, dedicated API-key header, query
/// parameter (§4.A).
pub fn extract_credential(bearer: Option<&str>, api_key_header: Option<&str>, query_param: Option<&str>) -> Option<String> {
	if let Some(b) = bearer {
		let trimmed = b.strip_prefix("Bearer ").unwrap_or(b).trim();
		if !trimmed.is_empty() {
			return Some(trimmed.to_string());
		}
	}
	if let Some(h) = api_key_header {
		if !h.is_empty() {
			return Some(h.to_string());
		}
	}
	if let Some(q) = query_param {
		if !q.is_empty() {
			return Some(q.to_string());
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bearer_takes_priority() {
		let got = extract_credential(Some("Bearer abc"), Some("def"), Some("ghi"));
		assert_eq!(got.as_deref(), Some("abc"));
	}

	#[test]
	fn falls_back_to_header_then_query() {
		assert_eq!(extract_credential(None, Some("def"), Some("ghi")).as_deref(), Some("def"));
		assert_eq!(extract_credential(None, None, Some("ghi")).as_deref(), Some("ghi"));
		assert_eq!(extract_credential(None, None, None), None);
	}

	#[test]
	fn bearer_without_prefix_is_used_verbatim() {
		assert_eq!(extract_credential(Some("abc"), None, None).as_deref(), Some("abc"));
	}
}
