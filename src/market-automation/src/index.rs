//! Read side of the automation network: the GraphQL index of submitted tasks.

use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use market_automation_types::TaskReceiptWrapper;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    errors::{AutomationError, Result},
    networks::NetworkConfig,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait TaskIndex: Send + Sync {
    /// Every task receipt wrapper ever submitted by `proxy`, in the order the index returns
    /// them. Records that do not match the wrapper schema are skipped.
    async fn task_receipt_wrappers(&self, proxy: Address) -> Result<Vec<TaskReceiptWrapper>>;
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WrappersData {
    #[serde(rename = "taskReceiptWrappers")]
    task_receipt_wrappers: Vec<Value>,
}

/// `TaskIndex` over the automation network's GraphQL subgraph.
pub struct GraphTaskIndex {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphTaskIndex {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AutomationError::IndexUnavailable(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn for_network(network: &NetworkConfig) -> Result<Self> {
        Self::new(network.index_endpoint.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TaskIndex for GraphTaskIndex {
    async fn task_receipt_wrappers(&self, proxy: Address) -> Result<Vec<TaskReceiptWrapper>> {
        let request_body = json!({
            "query": task_receipts_query(proxy),
            "variables": {}
        });
        debug!(endpoint = %self.endpoint, %proxy, "querying task index");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AutomationError::IndexUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                AutomationError::IndexUnavailable(format!("failed to read response: {e}"))
            })?;
        if !status.is_success() {
            return Err(AutomationError::IndexUnavailable(format!(
                "index answered {status}: {body}"
            )));
        }

        parse_task_receipts(&body)
    }
}

/// GraphQL query for all wrappers of `proxy`. The index stores addresses lowercased.
pub fn task_receipts_query(proxy: Address) -> String {
    format!(
        r#"{{
  taskReceiptWrappers(where: {{user: "0x{}"}}) {{
    taskReceipt {{
      id
      userProxy
      provider {{ addr module }}
      index
      tasks {{
        conditions {{ inst data }}
        actions {{ addr data operation dataFlow value termsOkCheck }}
        selfProviderGasLimit
        selfProviderGasPriceCeil
      }}
      expiryDate
      cycleId
      submissionsLeft
    }}
    submissionHash
    status
    submissionDate
    executionDate
    executionHash
    selfProvided
  }}
}}"#,
        hex::encode(proxy)
    )
}

/// Parse an index response body, skipping records that do not fit the wrapper schema.
pub fn parse_task_receipts(body: &str) -> Result<Vec<TaskReceiptWrapper>> {
    let response: GraphQLResponse<WrappersData> = serde_json::from_str(body)
        .map_err(|e| AutomationError::IndexUnavailable(format!("malformed index response: {e}")))?;

    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        return Err(AutomationError::IndexUnavailable(
            errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join(", "),
        ));
    }

    let records = response
        .data
        .ok_or_else(|| AutomationError::IndexUnavailable("response has no data".to_string()))?
        .task_receipt_wrappers;

    let mut wrappers = Vec::with_capacity(records.len());
    for (position, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<TaskReceiptWrapper>(record) {
            Ok(wrapper) => wrappers.push(wrapper),
            Err(e) => warn!(position, error = %e, "skipping malformed task record"),
        }
    }
    Ok(wrappers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_uses_lowercase_proxy() {
        let proxy: Address = "0x9671dC03ec719ff66C561e2dc73411b041548B73".parse().unwrap();
        let query = task_receipts_query(proxy);
        assert!(query.contains(r#"where: {user: "0x9671dc03ec719ff66c561e2dc73411b041548b73"}"#));
        assert!(query.contains("submissionsLeft"));
    }

    #[test]
    fn test_graphql_errors_are_index_failures() {
        let body = r#"{"data": null, "errors": [{"message": "indexer down"}]}"#;
        let err = parse_task_receipts(body).unwrap_err();
        assert!(matches!(err, AutomationError::IndexUnavailable(m) if m == "indexer down"));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let body = r#"{"data": {"taskReceiptWrappers": [{"taskReceipt": {"id": "x"}}]}}"#;
        assert!(parse_task_receipts(body).unwrap().is_empty());
    }

    #[test]
    fn test_non_json_body_is_index_failure() {
        assert!(matches!(
            parse_task_receipts("<html>"),
            Err(AutomationError::IndexUnavailable(_))
        ));
    }
}
