//! Tool trait and registry
//!
//! Tools are deterministic, side-effect-free operations. The chat path
//! only advertises the catalog to the active model; execution is reached
//! through the HTTP boundary.

use crate::error::AgentError;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Parameters handed to a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub parameters: Value,
}

impl ToolInput {
    pub fn new(parameters: Value) -> Self {
        Self { parameters }
    }
}

/// Structured result of a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

/// Name + description pair advertised to models
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

/// Trait for a single tool (deterministic execution)
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Name + description catalog, sorted for stable output
    pub fn catalog(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Current UTC date and time
pub struct CurrentTimeTool;

#[async_trait::async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &'static str {
        "current_time"
    }

    fn description(&self) -> &'static str {
        "Get the current date and time (UTC)"
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(ToolOutput {
            success: true,
            data: json!({
                "time": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            }),
            error: None,
        })
    }
}

/// Percentage of a value
pub struct PercentageTool;

#[async_trait::async_trait]
impl Tool for PercentageTool {
    fn name(&self) -> &'static str {
        "calculate_percentage"
    }

    fn description(&self) -> &'static str {
        "Calculate a percentage of a value, e.g. 5% of 1000"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let value = input
            .parameters
            .get("value")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                AgentError::InvalidToolInput("Expected numeric 'value'".to_string())
            })?;
        let percentage = input
            .parameters
            .get("percentage")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                AgentError::InvalidToolInput("Expected numeric 'percentage'".to_string())
            })?;

        Ok(ToolOutput {
            success: true,
            data: json!({
                "value": value,
                "percentage": percentage,
                "result": (value * percentage) / 100.0,
            }),
            error: None,
        })
    }
}

/// Demo price table; a market-data API replaces this in a later phase
const DEMO_PRICES: &[(&str, f64)] = &[
    ("BTC", 45_000.0),
    ("ETH", 2_800.0),
    ("SOL", 110.0),
    ("ADA", 0.55),
    ("DOT", 8.2),
];

const FALLBACK_PRICE: f64 = 1_000.0;

/// Demo crypto price lookup
pub struct CryptoPriceTool;

#[async_trait::async_trait]
impl Tool for CryptoPriceTool {
    fn name(&self) -> &'static str {
        "crypto_price"
    }

    fn description(&self) -> &'static str {
        "Look up demo price data for a crypto symbol (BTC, ETH, SOL, ADA, DOT)"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let symbol = input
            .parameters
            .get("symbol")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AgentError::InvalidToolInput("Expected 'symbol'".to_string())
            })?
            .to_uppercase();

        let price = DEMO_PRICES
            .iter()
            .find(|(known, _)| *known == symbol)
            .map(|(_, price)| *price)
            .unwrap_or(FALLBACK_PRICE);

        Ok(ToolOutput {
            success: true,
            data: json!({
                "symbol": symbol,
                "price": price,
                "change_24h": 2.5,
                "low_7d": price * 0.92,
                "high_7d": price * 1.08,
                "demo": true,
            }),
            error: None,
        })
    }
}

/// Demo portfolio recommendation by risk profile
pub struct RecommendationTool;

#[async_trait::async_trait]
impl Tool for RecommendationTool {
    fn name(&self) -> &'static str {
        "crypto_recommendation"
    }

    fn description(&self) -> &'static str {
        "Suggest a demo portfolio allocation for a risk level (low, medium, high)"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let risk_level = input
            .parameters
            .get("risk_level")
            .and_then(Value::as_str)
            .unwrap_or("medium")
            .to_lowercase();

        let portfolio: &[&str] = match risk_level.as_str() {
            "low" => &["BTC (70%)", "ETH (20%)", "Stablecoins (10%)"],
            "high" => &["DeFi altcoins (40%)", "ETH (30%)", "SOL (20%)", "Memecoins (10%)"],
            _ => &["BTC (40%)", "ETH (30%)", "SOL (20%)", "ADA (10%)"],
        };

        Ok(ToolOutput {
            success: true,
            data: json!({
                "risk_level": risk_level,
                "portfolio": portfolio,
                "note": "Educational simulation, not financial advice",
            }),
            error: None,
        })
    }
}

/// Create the default registry with the demo tool set
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(CurrentTimeTool));
    registry.register(Arc::new(PercentageTool));
    registry.register(Arc::new(CryptoPriceTool));
    registry.register(Arc::new(RecommendationTool));

    registry
}
