//! Output formatters for the admin binary.

use clap::ValueEnum;
use comfy_table::Table;
use serde::Serialize;

use marketplace::{DeleteSummary, Product, Stats, User, UserWithProfile};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

/// Render `value` as pretty JSON.
fn json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

pub fn users(format: OutputFormat, users: &[User]) -> String {
    match format {
        OutputFormat::Json => json(users),
        OutputFormat::Table => {
            if users.is_empty() {
                return "No users".to_string();
            }
            let mut table = Table::new();
            table.set_header(vec!["id", "email", "username", "role", "profile_picture"]);
            for user in users {
                table.add_row(vec![
                    user.id.to_string(),
                    user.email.clone(),
                    user.username.clone(),
                    user.role.to_string(),
                    or_dash(user.profile_picture.as_deref()),
                ]);
            }
            table.to_string()
        }
    }
}

pub fn user(format: OutputFormat, user: &UserWithProfile) -> String {
    match format {
        OutputFormat::Json => json(user),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["field", "value"]);
            table.add_row(vec!["id".to_string(), user.user.id.to_string()]);
            table.add_row(vec!["email".to_string(), user.user.email.clone()]);
            table.add_row(vec!["username".to_string(), user.user.username.clone()]);
            table.add_row(vec!["role".to_string(), user.user.role.to_string()]);
            table.add_row(vec![
                "profile_picture".to_string(),
                or_dash(user.user.profile_picture.as_deref()),
            ]);
            if let Some(client) = &user.client {
                table.add_row(vec!["client".to_string(), client.id.to_string()]);
                table.add_row(vec![
                    "name".to_string(),
                    format!("{} {}", client.firstname, client.lastname),
                ]);
            }
            if let Some(seller) = &user.seller {
                table.add_row(vec!["seller".to_string(), seller.id.to_string()]);
                table.add_row(vec!["business_name".to_string(), seller.business_name.clone()]);
            }
            table.to_string()
        }
    }
}

pub fn products(format: OutputFormat, products: &[Product]) -> String {
    match format {
        OutputFormat::Json => json(products),
        OutputFormat::Table => {
            if products.is_empty() {
                return "No products".to_string();
            }
            let mut table = Table::new();
            table.set_header(vec!["id", "seller_id", "name", "price", "stock"]);
            for product in products {
                table.add_row(vec![
                    product.id.to_string(),
                    product.seller_id.to_string(),
                    product.name.clone(),
                    product.price.to_string(),
                    product.stock.to_string(),
                ]);
            }
            table.to_string()
        }
    }
}

pub fn deleted(format: OutputFormat, summary: &DeleteSummary) -> String {
    match format {
        OutputFormat::Json => json(summary),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["entity", "deleted"]);
            for (entity, count) in &summary.deleted {
                table.add_row(vec![entity.clone(), count.to_string()]);
            }
            format!("{} record(s) deleted\n{table}", summary.total())
        }
    }
}

pub fn stats(format: OutputFormat, stats: &Stats) -> String {
    match format {
        OutputFormat::Json => json(stats),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["metric", "value"]);
            let rows = [
                ("schema_version", stats.schema_version.to_string()),
                ("users", stats.users.to_string()),
                ("clients", stats.clients.to_string()),
                ("sellers", stats.sellers.to_string()),
                ("products", stats.products.to_string()),
                ("messages", stats.messages.to_string()),
                ("notifications", stats.notifications.to_string()),
                ("size_on_disk", stats.size_on_disk.to_string()),
            ];
            for (metric, value) in rows {
                table.add_row(vec![metric.to_string(), value]);
            }
            table.to_string()
        }
    }
}
