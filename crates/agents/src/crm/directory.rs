//! In-memory customer directory and the CRM tools backed by it.
//!
//! Stands in for the real CRM backend: the tools exercise the full
//! invocation contract (start/progress/terminal through the context)
//! against deterministic data.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use sg_tools::{Tool, ToolContext, ToolOutcome};

#[derive(Debug, Clone)]
pub struct Customer {
    pub id: &'static str,
    pub name: &'static str,
    pub company: &'static str,
    pub email: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: &'static str,
    pub customer_id: &'static str,
    pub status: &'static str,
    pub total_usd: f64,
}

pub struct CustomerDirectory {
    customers: Vec<Customer>,
    orders: Vec<Order>,
}

impl CustomerDirectory {
    pub fn with_demo_data() -> Self {
        Self {
            customers: vec![
                Customer {
                    id: "C-001",
                    name: "Jane Miller",
                    company: "Acme Corp",
                    email: "jane@acme.example",
                    status: "active",
                },
                Customer {
                    id: "C-002",
                    name: "Tom Okafor",
                    company: "Globex",
                    email: "tom@globex.example",
                    status: "active",
                },
                Customer {
                    id: "C-003",
                    name: "Sara Lindqvist",
                    company: "Initech",
                    email: "sara@initech.example",
                    status: "churned",
                },
            ],
            orders: vec![
                Order {
                    id: "SO-1042",
                    customer_id: "C-001",
                    status: "shipped",
                    total_usd: 1280.0,
                },
                Order {
                    id: "SO-1043",
                    customer_id: "C-002",
                    status: "processing",
                    total_usd: 420.5,
                },
                Order {
                    id: "SO-9",
                    customer_id: "C-001",
                    status: "delivered",
                    total_usd: 99.0,
                },
            ],
        }
    }

    /// Case-insensitive substring match over name, company, and email.
    pub fn lookup(&self, query: &str) -> Vec<&Customer> {
        let needle = query.to_lowercase();
        self.customers
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.company.to_lowercase().contains(&needle)
                    || c.email.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id.eq_ignore_ascii_case(order_id))
    }

    pub fn pipeline_summary(&self) -> Value {
        let open: Vec<&Order> = self
            .orders
            .iter()
            .filter(|o| o.status == "processing")
            .collect();
        let open_total: f64 = open.iter().map(|o| o.total_usd).sum();
        json!({
            "customers": self.customers.len(),
            "active_customers": self.customers.iter().filter(|c| c.status == "active").count(),
            "open_orders": open.len(),
            "open_order_total_usd": open_total,
        })
    }
}

fn customer_json(c: &Customer) -> Value {
    json!({
        "id": c.id,
        "name": c.name,
        "company": c.company,
        "email": c.email,
        "status": c.status,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CustomerLookupTool {
    directory: Arc<CustomerDirectory>,
}

impl CustomerLookupTool {
    pub fn new(directory: Arc<CustomerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for CustomerLookupTool {
    fn name(&self) -> &str {
        "customer_lookup"
    }

    fn description(&self) -> &str {
        "Search customers by name, company, or email"
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolOutcome {
        let query = params["query"].as_str().unwrap_or("").to_owned();
        let tool_id = match ctx.start(self.name(), params).await {
            Ok(id) => id,
            Err(_) => return ToolOutcome::failed("cancelled"),
        };

        ctx.progress(tool_id, &format!("searching for \"{query}\""), None)
            .await;

        if query.is_empty() {
            ctx.error(tool_id, "empty query").await;
            return ToolOutcome::failed("empty query");
        }

        let matches: Vec<Value> = self
            .directory
            .lookup(&query)
            .into_iter()
            .map(customer_json)
            .collect();
        let data = json!({ "matches": matches });
        ctx.result(tool_id, data.clone()).await;
        ToolOutcome::ok(data)
    }
}

pub struct OrderStatusTool {
    directory: Arc<CustomerDirectory>,
}

impl OrderStatusTool {
    pub fn new(directory: Arc<CustomerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for OrderStatusTool {
    fn name(&self) -> &str {
        "order_status"
    }

    fn description(&self) -> &str {
        "Fetch the status of one order by id"
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolOutcome {
        let order_id = params["order_id"].as_str().unwrap_or("").to_owned();
        let tool_id = match ctx.start(self.name(), params).await {
            Ok(id) => id,
            Err(_) => return ToolOutcome::failed("cancelled"),
        };

        ctx.progress(tool_id, &format!("fetching order {order_id}"), None)
            .await;

        match self.directory.order(&order_id) {
            Some(order) => {
                let data = json!({
                    "order_id": order.id,
                    "status": order.status,
                    "total_usd": order.total_usd,
                });
                ctx.result(tool_id, data.clone()).await;
                ToolOutcome::ok(data)
            }
            None => {
                let message = format!("order {order_id} not found");
                ctx.error(tool_id, &message).await;
                ToolOutcome::failed(message)
            }
        }
    }
}

pub struct PipelineSummaryTool {
    directory: Arc<CustomerDirectory>,
}

impl PipelineSummaryTool {
    pub fn new(directory: Arc<CustomerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for PipelineSummaryTool {
    fn name(&self) -> &str {
        "pipeline_summary"
    }

    fn description(&self) -> &str {
        "Summarize customers and open orders"
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolOutcome {
        let tool_id = match ctx.start(self.name(), params).await {
            Ok(id) => id,
            Err(_) => return ToolOutcome::failed("cancelled"),
        };
        let data = self.directory.pipeline_summary();
        ctx.result(tool_id, data.clone()).await;
        ToolOutcome::ok(data)
    }
}
