use serde::de::DeserializeOwned;

/// Decodes a stored payload, treating malformed data as absent.
///
/// Persisted blobs come from files and document flags the user (or an
/// older version) may have hand-edited. A payload that no longer
/// deserializes is logged and dropped; the caller falls back to
/// defaults rather than failing the rebuild.
pub fn decode_lenient<T: DeserializeOwned>(context: &str, value: serde_json::Value) -> Option<T> {
	match serde_json::from_value(value) {
		Ok(decoded) => Some(decoded),
		Err(err) => {
			tracing::warn!(context, %err, "discarding malformed persisted payload");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;

	use super::*;

	#[derive(Debug, Deserialize, PartialEq)]
	struct Rec {
		id: String,
		order: i32,
	}

	#[test]
	fn test_decode_lenient_valid() {
		let value = serde_json::json!({"id": "combat", "order": 3});
		let rec: Option<Rec> = decode_lenient("test", value);
		assert_eq!(rec, Some(Rec { id: "combat".into(), order: 3 }));
	}

	#[test]
	fn test_decode_lenient_malformed_is_absent() {
		let value = serde_json::json!({"id": 42});
		let rec: Option<Rec> = decode_lenient("test", value);
		assert_eq!(rec, None);
	}
}
