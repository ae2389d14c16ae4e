//! Function execution over the catalog and cart collaborators.
//!
//! One closed enum, one exhaustive match: adding an operation is a
//! compile-time change, not a runtime lookup miss.

use crate::context::{ContextValidator, Validation};
use crate::error::CoreError;
use crate::session::{SearchHit, SearchRecord, SessionStore};
use chrono::Utc;
use curio_catalog::{CartStore, CatalogError, CatalogStore, Product, ProductCategory};
use curio_protocol::{
    ErrorCode, FunctionCall, FunctionFailure, FunctionName, FunctionResult, SessionId, Suggestion,
};
use log::{error, info};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;
const DETAIL_RECOMMENDATION_LIMIT: usize = 5;

/// Arguments for `search_products`.
#[derive(Debug, Deserialize)]
struct SearchProductsArgs {
    query: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

/// Arguments for `show_product_details`.
#[derive(Debug, Deserialize)]
struct ShowProductDetailsArgs {
    product_id: String,
    #[serde(default = "default_true")]
    include_recommendations: bool,
}

/// Arguments for `add_to_cart`.
#[derive(Debug, Deserialize)]
struct AddToCartArgs {
    product_id: String,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

/// Arguments for `get_recommendations`.
#[derive(Debug, Deserialize)]
struct GetRecommendationsArgs {
    based_on: String,
    #[serde(default = "default_recommendation_limit")]
    max_results: usize,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_quantity() -> i64 {
    1
}

fn default_recommendation_limit() -> usize {
    DEFAULT_RECOMMENDATION_LIMIT
}

/// Executes validated function calls against the collaborators.
pub struct FunctionExecutor {
    sessions: SessionStore,
    validator: Arc<ContextValidator>,
    catalog: Arc<dyn CatalogStore>,
    cart: Arc<dyn CartStore>,
}

impl FunctionExecutor {
    /// Wire the executor to its collaborators.
    pub fn new(
        sessions: SessionStore,
        validator: Arc<ContextValidator>,
        catalog: Arc<dyn CatalogStore>,
        cart: Arc<dyn CartStore>,
    ) -> Self {
        Self {
            sessions,
            validator,
            catalog,
            cart,
        }
    }

    /// Shared validator, exposed for observability surfaces.
    pub fn validator(&self) -> &ContextValidator {
        &self.validator
    }

    /// Resolve a function call into a result.
    ///
    /// This never escalates: collaborator failures are normalized into a
    /// failed result with a generic message, and nothing from the internals
    /// (queries, stack traces) reaches the wire.
    pub async fn execute(&self, session_id: SessionId, call: &FunctionCall) -> FunctionResult {
        if let Err(err) = self.sessions.ensure_active(session_id) {
            info!(
                "rejecting call against dead session (session_id={}, function={}): {err}",
                session_id, call.name
            );
            return FunctionResult::failure(FunctionFailure::new(
                ErrorCode::SessionExpired,
                "session is expired; create a new session",
            ));
        }
        self.sessions.touch(session_id);
        info!(
            "executing function (session_id={}, function={}, call_id={})",
            session_id, call.name, call.call_id
        );
        let outcome = match call.name {
            FunctionName::SearchProducts => self.search_products(session_id, &call.arguments).await,
            FunctionName::ShowProductDetails => {
                self.show_product_details(session_id, &call.arguments).await
            }
            FunctionName::AddToCart => self.add_to_cart(session_id, &call.arguments).await,
            FunctionName::GetRecommendations => {
                self.get_recommendations(session_id, &call.arguments).await
            }
        };
        match outcome {
            Ok(data) => FunctionResult::ok(data),
            Err(failure) => FunctionResult::failure(failure),
        }
    }

    /// Search never fails on empty input; it records what it surfaced.
    async fn search_products(
        &self,
        session_id: SessionId,
        arguments: &Value,
    ) -> Result<Value, FunctionFailure> {
        let args: SearchProductsArgs = parse_args(arguments)?;
        let category = parse_category(args.category.as_deref())?;
        let results = self
            .catalog
            .search(&args.query, category, args.limit)
            .await
            .map_err(internal_failure)?;
        let record = SearchRecord {
            query: args.query.clone(),
            category,
            hits: results.products.iter().map(hit_of).collect(),
            created_at: Utc::now(),
        };
        self.sessions
            .record_search(session_id, record)
            .map_err(session_failure)?;
        Ok(json!({
            "results": results.products,
            "total_count": results.total_count,
        }))
    }

    /// Details require the id to have been surfaced to the assistant first.
    async fn show_product_details(
        &self,
        session_id: SessionId,
        arguments: &Value,
    ) -> Result<Value, FunctionFailure> {
        let args: ShowProductDetailsArgs = parse_args(arguments)?;
        self.check_reference(session_id, &args.product_id)?;
        let product = self
            .catalog
            .get(&args.product_id)
            .await
            .map_err(internal_failure)?
            .ok_or_else(|| product_gone(&args.product_id))?;
        let recommendations = if args.include_recommendations {
            Some(
                self.catalog
                    .similar(&args.product_id, DETAIL_RECOMMENDATION_LIMIT)
                    .await
                    .map_err(internal_failure)?,
            )
        } else {
            None
        };
        let mut references = vec![hit_of(&product)];
        if let Some(recommendations) = &recommendations {
            references.extend(recommendations.iter().map(hit_of));
        }
        self.sessions
            .record_references(session_id, references)
            .map_err(session_failure)?;
        let mut payload = json!({ "product": product });
        if let (Some(recommendations), Value::Object(map)) = (recommendations, &mut payload) {
            map.insert("recommendations".to_string(), json!(recommendations));
        }
        Ok(payload)
    }

    /// Cart adds validate the reference, the quantity, and the stock, in
    /// that order; stock reservation is the atomic check-and-decrement.
    async fn add_to_cart(
        &self,
        session_id: SessionId,
        arguments: &Value,
    ) -> Result<Value, FunctionFailure> {
        let args: AddToCartArgs = parse_args(arguments)?;
        let quantity = u32::try_from(args.quantity).ok().filter(|q| *q >= 1).ok_or_else(|| {
            FunctionFailure::new(
                ErrorCode::InvalidQuantity,
                format!("quantity must be a positive integer, got {}", args.quantity),
            )
        })?;
        self.check_reference(session_id, &args.product_id)?;
        let product = self
            .catalog
            .get(&args.product_id)
            .await
            .map_err(internal_failure)?
            .ok_or_else(|| product_gone(&args.product_id))?;
        self.catalog
            .reserve_stock(&args.product_id, quantity)
            .await
            .map_err(|err| match err {
                CatalogError::InsufficientStock {
                    requested,
                    available,
                    ..
                } => FunctionFailure::new(
                    ErrorCode::InsufficientStock,
                    format!("only {available} in stock, requested {requested}"),
                ),
                CatalogError::ProductNotFound(id) => product_gone(&id),
                other => internal_failure(other),
            })?;
        let (cart_item, cart_summary) =
            match self.cart.add_item(session_id, &product, quantity).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    // Undo the reservation so a cart failure cannot leak stock.
                    if let Err(release_err) = self
                        .catalog
                        .release_stock(&args.product_id, quantity)
                        .await
                    {
                        error!(
                            "failed to release stock after cart error (product_id={}): {release_err}",
                            args.product_id
                        );
                    }
                    return Err(internal_failure(err));
                }
            };
        Ok(json!({
            "cart_item": cart_item,
            "cart_summary": cart_summary,
        }))
    }

    /// Categories are not hallucination-prone; bare ids are validated.
    async fn get_recommendations(
        &self,
        session_id: SessionId,
        arguments: &Value,
    ) -> Result<Value, FunctionFailure> {
        let args: GetRecommendationsArgs = parse_args(arguments)?;
        let (recommendations, strategy) =
            if let Some(category) = ProductCategory::parse(&args.based_on.to_lowercase()) {
                let recommendations = self
                    .catalog
                    .by_category(category, args.max_results)
                    .await
                    .map_err(internal_failure)?;
                (recommendations, "category")
            } else {
                self.check_reference(session_id, &args.based_on)?;
                let recommendations = self
                    .catalog
                    .similar(&args.based_on, args.max_results)
                    .await
                    .map_err(internal_failure)?;
                (recommendations, "similar_products")
            };
        self.sessions
            .record_references(session_id, recommendations.iter().map(hit_of).collect())
            .map_err(session_failure)?;
        Ok(json!({
            "recommendations": recommendations,
            "context": {
                "based_on": args.based_on,
                "strategy": strategy,
            },
        }))
    }

    /// Run the validator and convert a miss into the wire failure.
    fn check_reference(
        &self,
        session_id: SessionId,
        product_id: &str,
    ) -> Result<(), FunctionFailure> {
        match self.validator.validate(session_id, product_id) {
            Validation::Valid => Ok(()),
            Validation::Invalid { suggestions } => Err(invalid_reference(product_id, suggestions)),
            Validation::SessionExpired => Err(FunctionFailure::new(
                ErrorCode::SessionExpired,
                "session is expired; create a new session",
            )),
        }
    }
}

fn hit_of(product: &Product) -> SearchHit {
    SearchHit {
        id: product.id.clone(),
        name: product.name.clone(),
    }
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, FunctionFailure> {
    serde_json::from_value(arguments.clone()).map_err(|err| {
        FunctionFailure::new(
            ErrorCode::ValidationError,
            format!("invalid arguments: {err}"),
        )
    })
}

fn parse_category(raw: Option<&str>) -> Result<Option<ProductCategory>, FunctionFailure> {
    match raw {
        None => Ok(None),
        Some(raw) => ProductCategory::parse(&raw.to_lowercase())
            .map(Some)
            .ok_or_else(|| {
                FunctionFailure::new(
                    ErrorCode::ValidationError,
                    format!("unknown category: {raw}"),
                )
            }),
    }
}

fn invalid_reference(product_id: &str, suggestions: Vec<Suggestion>) -> FunctionFailure {
    FunctionFailure::new(
        ErrorCode::InvalidProductId,
        format!("product {product_id} is not in the current conversation context"),
    )
    .with_suggestions(suggestions)
}

fn product_gone(product_id: &str) -> FunctionFailure {
    FunctionFailure::new(
        ErrorCode::ProductNotFound,
        format!("product {product_id} is no longer available"),
    )
}

/// Collaborator failures are logged in full and normalized for the wire.
fn internal_failure(err: impl std::fmt::Display) -> FunctionFailure {
    error!("collaborator failure during function execution: {err}");
    FunctionFailure::new(
        ErrorCode::InternalError,
        "an internal error occurred handling the request",
    )
}

fn session_failure(err: CoreError) -> FunctionFailure {
    match err {
        CoreError::SessionExpired(_) | CoreError::UnknownSession(_) => FunctionFailure::new(
            ErrorCode::SessionExpired,
            "session is expired; create a new session",
        ),
        other => internal_failure(other),
    }
}
