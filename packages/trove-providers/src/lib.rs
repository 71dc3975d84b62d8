pub mod embedding;

use color_eyre::{Result, eyre};
use reqwest::header::{HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub fn default_headers(headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut out = HeaderMap::new();

	for (key, value) in headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};

		out.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(out)
}
