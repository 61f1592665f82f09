use super::HandlerContext;
use crate::error::{AgentError, Result};
use filmdesk_db::{BudgetItem, Job, ProgressFlag};
use serde_json::{json, Value};
use tracing::info;

pub const DEFAULT_CONTINGENCY_PERCENT: u32 = 10;

/// Build the next budget version from the standard line items.
///
/// `contingency_percent` may be overridden through the job's input params.
pub(super) async fn generate(ctx: &HandlerContext, job: &Job) -> Result<Value> {
    let project = ctx.db.projects_require(&job.project_id).await?;

    let contingency_percent = match job.input_params.get("contingency_percent") {
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            AgentError::validation(format!(
                "contingency_percent must be a whole number, got '{}'",
                raw
            ))
        })?,
        None => DEFAULT_CONTINGENCY_PERCENT,
    };

    let mut items = standard_budget_items();
    let subtotal: f64 = items.iter().map(BudgetItem::total).sum();
    let contingency_amount = subtotal * f64::from(contingency_percent) / 100.0;
    items.push(BudgetItem {
        category: "other".to_string(),
        subcategory: "Contingency".to_string(),
        description: format!("Contingency ({}%)", contingency_percent),
        quantity: 1.0,
        unit: "project".to_string(),
        rate: contingency_amount,
        order_index: items.len() as u32,
    });

    let budget = ctx
        .db
        .budgets_create_with_items(&project.id, contingency_percent, &items)
        .await?;
    ctx.db
        .projects_mark_progress(&project.id, ProgressFlag::BudgetGenerated)
        .await?;

    info!(
        project_id = %project.id,
        budget_id = %budget.id,
        version = budget.version,
        total = budget.total_budget,
        "Budget generated"
    );
    Ok(json!({
        "budget_id": budget.id,
        "total_budget": budget.total_budget,
        "items_created": items.len(),
        "contingency_amount": contingency_amount,
    }))
}

/// The eighteen line items every generated budget starts from.
pub fn standard_budget_items() -> Vec<BudgetItem> {
    const ITEMS: [(&str, &str, &str, f64, &str, f64); 18] = [
        ("above_line", "Producer", "Producer Fee", 1.0, "project", 5000.0),
        ("above_line", "Director", "Director Fee", 1.0, "project", 8000.0),
        ("above_line", "Writer", "Script Development", 1.0, "project", 2500.0),
        ("below_line", "Cast", "Lead Actor #1", 5.0, "day", 500.0),
        ("below_line", "Cast", "Lead Actor #2", 5.0, "day", 400.0),
        ("below_line", "Cast", "Supporting Cast", 3.0, "day", 200.0),
        ("below_line", "Crew", "Director of Photography", 5.0, "day", 600.0),
        ("below_line", "Crew", "Sound Recordist", 5.0, "day", 300.0),
        ("below_line", "Crew", "Gaffer", 5.0, "day", 400.0),
        ("below_line", "Equipment", "Camera Package", 5.0, "day", 400.0),
        ("below_line", "Equipment", "Lighting Package", 5.0, "day", 300.0),
        ("below_line", "Equipment", "Sound Package", 5.0, "day", 150.0),
        ("below_line", "Locations", "Location Fees", 3.0, "day", 200.0),
        ("below_line", "Catering", "Meals and Craft Services", 5.0, "day", 100.0),
        ("post_production", "Editing", "Editor Fee", 2.0, "week", 1500.0),
        ("post_production", "Color", "Color Correction", 1.0, "project", 2000.0),
        ("post_production", "Sound", "Sound Design & Mix", 1.0, "project", 3000.0),
        ("post_production", "Music", "Original Score", 1.0, "project", 2500.0),
    ];

    ITEMS
        .iter()
        .enumerate()
        .map(|(idx, (category, subcategory, description, quantity, unit, rate))| BudgetItem {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            description: description.to_string(),
            quantity: *quantity,
            unit: unit.to_string(),
            rate: *rate,
            order_index: idx as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_items_subtotal() {
        let items = standard_budget_items();
        assert_eq!(items.len(), 18);
        let subtotal: f64 = items.iter().map(BudgetItem::total).sum();
        assert_eq!(subtotal, 42_950.0);
    }
}
