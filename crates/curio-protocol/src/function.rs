//! Function-call intents, results, and failure codes.

use crate::ToolCallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Closed set of operations the assistant may invoke.
///
/// Adding or removing an operation is a compile-time change: every dispatch
/// site matches exhaustively on this enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FunctionName {
    /// Search the catalog and record results in session context.
    SearchProducts,
    /// Fetch full details for a previously surfaced product.
    ShowProductDetails,
    /// Add a previously surfaced product to the cart.
    AddToCart,
    /// Recommend products based on a product id or category.
    GetRecommendations,
}

impl FunctionName {
    /// Return the wire name for the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionName::SearchProducts => "search_products",
            FunctionName::ShowProductDetails => "show_product_details",
            FunctionName::AddToCart => "add_to_cart",
            FunctionName::GetRecommendations => "get_recommendations",
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function-call intent as the agent emits it.
///
/// Transient: exists only between the agent yielding it and the executor
/// resolving it into a [`FunctionResult`] with the same `call_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Correlation id shared with the matching result.
    pub call_id: ToolCallId,
    /// Operation to invoke.
    pub name: FunctionName,
    /// Raw argument map as emitted by the agent.
    pub arguments: Value,
}

/// Outcome of one function call, immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation-specific payload on success.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Failure descriptor on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FunctionFailure>,
}

impl FunctionResult {
    /// Build a successful result carrying the payload.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Build a failed result carrying the failure descriptor.
    pub fn failure(failure: FunctionFailure) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(failure),
        }
    }
}

/// Structured failure attached to an unsuccessful [`FunctionResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionFailure {
    /// Machine-readable failure code.
    pub code: ErrorCode,
    /// Human-readable message safe to put on the wire.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "FailureDetails::is_empty")]
    pub details: FailureDetails,
}

impl FunctionFailure {
    /// Build a failure with no extra detail.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: FailureDetails::default(),
        }
    }

    /// Attach ranked suggestions to the failure.
    pub fn with_suggestions(mut self, suggestions: Vec<Suggestion>) -> Self {
        self.details.suggestions = suggestions;
        self
    }
}

/// Detail block inside a failure payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FailureDetails {
    /// Ranked alternatives for an unrecognized product id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

impl FailureDetails {
    /// Whether the block carries no detail and can be omitted on the wire.
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}

/// Candidate product offered when validation rejects an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    /// Catalog product id.
    pub product_id: String,
    /// Display name for the product.
    pub name: String,
}

/// Failure codes surfaced in function results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Product id passed validation but is gone from the catalog.
    ProductNotFound,
    /// Product id never appeared in this session's context.
    InvalidProductId,
    /// Requested quantity is not a positive integer.
    InvalidQuantity,
    /// Requested quantity exceeds available stock.
    InsufficientStock,
    /// Session is missing or past its expiry.
    SessionExpired,
    /// Arguments failed structural validation.
    ValidationError,
    /// Collaborator failure normalized to a generic message.
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn function_names_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(FunctionName::ShowProductDetails).expect("serialize"),
            json!("show_product_details")
        );
        assert_eq!(FunctionName::AddToCart.as_str(), "add_to_cart");
    }

    #[test]
    fn failure_wire_shape_matches_contract() {
        let failure = FunctionFailure::new(ErrorCode::InvalidProductId, "unknown product")
            .with_suggestions(vec![Suggestion {
                product_id: "prod_001".to_string(),
                name: "Wireless Bluetooth Headphones".to_string(),
            }]);
        let result = FunctionResult::failure(failure);
        assert_eq!(
            serde_json::to_value(&result).expect("serialize"),
            json!({
                "success": false,
                "error": {
                    "code": "INVALID_PRODUCT_ID",
                    "message": "unknown product",
                    "details": {
                        "suggestions": [
                            { "product_id": "prod_001", "name": "Wireless Bluetooth Headphones" }
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn success_wire_shape_omits_error() {
        let result = FunctionResult::ok(json!({ "total_count": 2 }));
        assert_eq!(
            serde_json::to_value(&result).expect("serialize"),
            json!({ "success": true, "data": { "total_count": 2 } })
        );
    }

    #[test]
    fn plain_failure_omits_empty_details() {
        let result = FunctionResult::failure(FunctionFailure::new(
            ErrorCode::SessionExpired,
            "session expired",
        ));
        assert_eq!(
            serde_json::to_value(&result).expect("serialize"),
            json!({
                "success": false,
                "error": { "code": "SESSION_EXPIRED", "message": "session expired" }
            })
        );
    }
}
