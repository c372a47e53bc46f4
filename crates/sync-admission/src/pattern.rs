use regex::Regex;

/// Compiles a `*`-glob into an anchored, case-insensitive regex (§4.A
/// "Pattern matching is glob-to-regex").
pub fn glob_to_regex(pattern: &str) -> Option<Regex> {
	let escaped = regex::escape(pattern).replace("\\*", ".*");
	Regex::new(&format!("(?i)^{escaped}$")).ok()
}

pub fn matches_any(patterns: &[String], value: &str) -> bool {
	patterns.iter().filter_map(|p| glob_to_regex(p)).any(|re| re.is_match(value))
}

/// Exact host match, or `*.suffix` where `host` ends with `.suffix` or
/// equals `suffix` exactly.
pub fn domain_allowed(allowed: &[String], host: &str) -> bool {
	if allowed.is_empty() {
		return true;
	}
	allowed.iter().any(|pattern| match pattern.strip_prefix("*.") {
		Some(suffix) => host.eq_ignore_ascii_case(suffix) || host.to_ascii_lowercase().ends_with(&format!(".{}", suffix.to_ascii_lowercase())),
		None => host.eq_ignore_ascii_case(pattern),
	})
}

/// Matches an IPv4 address against a list of `*`, bare addresses, or
/// `a.b.c.d/n` CIDR ranges.
pub fn ip_matches(entries: &[String], ip: &str) -> bool {
	let Ok(addr) = ip.parse::<std::net::Ipv4Addr>() else {
		return false;
	};
	let addr_bits = u32::from(addr);

	entries.iter().any(|entry| {
		if entry == "*" {
			return true;
		}
		if let Some((network, prefix)) = entry.split_once('/') {
			let Ok(network_addr) = network.parse::<std::net::Ipv4Addr>() else {
				return false;
			};
			let Ok(prefix_len) = prefix.parse::<u32>() else {
				return false;
			};
			if prefix_len > 32 {
				return false;
			}
			let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
			(addr_bits & mask) == (u32::from(network_addr) & mask)
		} else {
			entry.parse::<std::net::Ipv4Addr>().is_ok_and(|e| e == addr)
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn glob_matches_wildcard_suffix() {
		assert!(matches_any(&["bad-bot*".into()], "bad-bot-9000"));
		assert!(!matches_any(&["bad-bot*".into()], "good-bot-9000"));
	}

	#[test]
	fn glob_is_case_insensitive_and_anchored() {
		assert!(matches_any(&["Mozilla*".into()], "mozilla/5.0 test"));
		assert!(!matches_any(&["mozilla".into()], "not mozilla at all"));
	}

	#[test]
	fn domain_wildcard_suffix() {
		assert!(domain_allowed(&["*.example.com".into()], "api.example.com"));
		assert!(domain_allowed(&["*.example.com".into()], "example.com"));
		assert!(!domain_allowed(&["*.example.com".into()], "example.org"));
	}

	#[test]
	fn ip_cidr_and_wildcard() {
		assert!(ip_matches(&["10.0.0.0/24".into()], "10.0.0.5"));
		assert!(!ip_matches(&["10.0.0.0/24".into()], "10.0.1.5"));
		assert!(ip_matches(&["*".into()], "203.0.113.7"));
		assert!(ip_matches(&["10.0.0.5".into()], "10.0.0.5"));
	}
}
