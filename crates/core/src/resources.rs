//! Thin payload shaping for common resource calls.

use serde::Serialize;
use serde_json::Value;
use stor_protocol::{Object, Payload, codes, integer_value};
use stor_runtime::{Error, Result};

use crate::client::{ArrayClient, Request};
use crate::registry::Args;

/// Default number of rows requested per page by [`ArrayClient::list_all`].
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched by one [`ArrayClient::list_all`] call.
pub const MAX_PAGES: usize = 10_000;

/// Binding between a persistent volume name and an array resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelBinding {
	pub resource_id: String,
	pub resource_type: String,
	pub pv_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cluster_name: Option<String>,
}

impl ArrayClient {
	/// Reads the `COUNT` field of a count query.
	pub async fn count(&self, operation: &str, args: Args) -> Result<u64> {
		let payload = self.execute(&Request::get(operation).args(args)).await?;
		let raw = payload
			.as_object()
			.and_then(|object| object.get("COUNT"))
			.ok_or_else(|| Error::CountNotFound(operation.to_string()))?;

		let count = integer_value(raw).ok_or_else(|| unexpected(operation, format!("COUNT is not an integer: {raw}")))?;
		u64::try_from(count).map_err(|_| unexpected(operation, format!("COUNT is negative: {count}")))
	}

	/// Fetches every row of a list query, `page_size` rows at a time, until a short
	/// page comes back.
	///
	/// Fails with [`Error::UnexpectedPayload`] when a full page repeats the previous
	/// one (the array is ignoring `range`) or after [`MAX_PAGES`] pages.
	pub async fn list_all(&self, operation: &str, args: Args, page_size: usize) -> Result<Vec<Object>> {
		let page_size = page_size.max(1);
		let mut rows: Vec<Object> = Vec::new();
		let mut start = 0;
		let mut previous = 0;

		for _ in 0..MAX_PAGES {
			let end = start + page_size;
			let request = Request::get(operation).args(args.clone()).query("range", format!("[{start}-{end}]"));
			let page = self.execute(&request).await?.into_list();
			let fetched = page.len();

			if fetched >= page_size && fetched == previous && rows[rows.len() - previous..] == page[..] {
				return Err(unexpected(operation, format!("page [{start}-{end}] repeats the previous page; range is not honored")));
			}
			rows.extend(page);

			if fetched < page_size {
				return Ok(rows);
			}
			previous = fetched;
			start = end;
		}

		Err(unexpected(operation, format!("more than {MAX_PAGES} pages of {page_size} rows")))
	}

	/// Reads one resource. A list reply yields its first row; no data yields `None`.
	pub async fn get(&self, operation: &str, args: Args) -> Result<Option<Object>> {
		let payload = self.execute(&Request::get(operation).args(args)).await?;
		Ok(match payload {
			Payload::Object(object) => Some(object),
			Payload::List(rows) => rows.into_iter().next(),
			Payload::Absent => None,
		})
	}

	/// Creates a resource and returns the array's description of it.
	pub async fn create(&self, operation: &str, args: Args, body: Value) -> Result<Object> {
		let payload = self.execute(&Request::post(operation).args(args).body(body)).await?;
		Ok(payload.into_list().into_iter().next().unwrap_or_default())
	}

	pub async fn update(&self, operation: &str, args: Args, body: Value) -> Result<()> {
		self.execute(&Request::put(operation).args(args).body(body)).await.map(drop)
	}

	pub async fn delete(&self, operation: &str, args: Args) -> Result<()> {
		self.execute(&Request::delete(operation).args(args)).await.map(drop)
	}

	/// Associates a label; succeeds if it is already associated.
	pub async fn associate_label(&self, binding: &LabelBinding) -> Result<()> {
		let request = Request::post("label.associate")
			.body(serde_json::to_value(binding)?)
			.idempotent(&[codes::LABEL_ALREADY_ASSOCIATED]);
		self.execute(&request).await.map(drop)
	}

	/// Removes a label; succeeds if it is not associated.
	pub async fn disassociate_label(&self, binding: &LabelBinding) -> Result<()> {
		let request = Request::delete("label.disassociate")
			.body(serde_json::to_value(binding)?)
			.idempotent(&[codes::LABEL_NOT_ASSOCIATED]);
		self.execute(&request).await.map(drop)
	}

	/// System description (`/system/`).
	pub async fn system_info(&self) -> Result<Object> {
		self.get("system.info", Args::new())
			.await?
			.ok_or_else(|| unexpected("system.info", "reply has no data".to_string()))
	}
}

fn unexpected(operation: &str, reason: String) -> Error {
	Error::UnexpectedPayload {
		operation: operation.to_string(),
		reason,
	}
}
