//! Question text for the oracle-like question registry.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use time::OffsetDateTime;

use crate::{
    abi::market::IRealitio,
    errors::{AutomationError, Result},
};

/// Template of single-select questions.
pub const SINGLE_SELECT_TEMPLATE_ID: u64 = 2;
/// Answer window once the question opens, in seconds.
pub const ANSWER_TIMEOUT_SECS: u32 = 86_400;

const SEPARATOR: char = '\u{241f}';
const DEFAULT_LANGUAGE: &str = "en_US";

/// A single-select question as asked at market creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSpec {
    pub title: String,
    pub outcomes: Vec<String>,
    pub category: String,
    /// Empty means `en_US`.
    pub language: String,
    /// Opening time of the question; answers are accepted from then on.
    pub resolution: OffsetDateTime,
}

impl QuestionSpec {
    pub fn outcome_count(&self) -> u64 {
        self.outcomes.len() as u64
    }

    /// `title ␟ "a","b" ␟ category ␟ language`, title and outcomes JSON-escaped.
    pub fn encode_text(&self) -> Result<String> {
        let title = json_string(&self.title)?;
        let outcomes = serde_json::to_string(&self.outcomes)
            .map_err(|e| AutomationError::InvalidRequest(e.to_string()))?;
        let outcomes = outcomes
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(&outcomes);
        let language = if self.language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            &self.language
        };

        Ok(format!(
            "{title}{SEPARATOR}{outcomes}{SEPARATOR}{}{SEPARATOR}{language}",
            self.category
        ))
    }

    /// `askQuestion` calldata for this question.
    pub fn encode_ask(&self, arbitrator: Address) -> Result<Bytes> {
        let opening = self.resolution.unix_timestamp();
        let opening_ts = u32::try_from(opening).map_err(|_| {
            AutomationError::InvalidRequest(format!("opening timestamp {opening} out of range"))
        })?;
        Ok(IRealitio::askQuestionCall {
            template_id: U256::from(SINGLE_SELECT_TEMPLATE_ID),
            question: self.encode_text()?,
            arbitrator,
            timeout: ANSWER_TIMEOUT_SECS,
            opening_ts,
            nonce: U256::ZERO,
        }
        .abi_encode()
        .into())
    }
}

fn json_string(value: &str) -> Result<String> {
    let quoted =
        serde_json::to_string(value).map_err(|e| AutomationError::InvalidRequest(e.to_string()))?;
    Ok(quoted[1..quoted.len() - 1].to_string())
}
