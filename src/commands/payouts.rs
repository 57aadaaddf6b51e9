//! Payout Commands
//!
//! Milestones are embedded in the client record. Older records kept them in
//! a `milestones` sub-collection; writing such a record moves the list into
//! the parent and removes the old documents in the same batch.

use pm_console_backend::{CollectionPath, Document, DomainResult, Fields, WriteBatch};
use serde::Serialize;
use serde_json::Value;

use super::{patch, required, to_fields, Backend};
use crate::edit::{json_number, parse_float_prefix};
use crate::models::{paid_total, Milestone, PayoutClient, PayoutStatus, Record};
use crate::nested;

/// Add-client form of the payout tracker
#[derive(Debug, Clone, Default)]
pub struct PayoutForm {
    pub name: String,
    pub project: String,
    pub status: PayoutStatus,
    pub due_date: String,
    pub total_budget: String,
}

/// Add-milestone form
#[derive(Debug, Clone, Default)]
pub struct MilestoneForm {
    pub title: String,
    pub amount: String,
    pub due_date: String,
}

// ========================
// Argument Structs
// ========================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayoutArgs<'a> {
    pub name: &'a str,
    pub project: &'a str,
    pub status: &'a str,
    pub due_date: &'a str,
    pub total_budget: Value,
    pub paid_amount: Value,
    pub order: i64,
    pub milestones: Vec<Milestone>,
}

impl<'a> NewPayoutArgs<'a> {
    /// `order` places the new client after the existing ones
    pub fn from_form(form: &'a PayoutForm, order: i64) -> DomainResult<Self> {
        Ok(Self {
            name: required(&form.name, "Client name")?,
            project: form.project.trim(),
            status: form.status.as_str(),
            due_date: &form.due_date,
            total_budget: json_number(parse_float_prefix(&form.total_budget).unwrap_or(0.0)),
            paid_amount: Value::from(0),
            order,
            milestones: Vec::new(),
        })
    }
}

impl Milestone {
    /// Validate the form; the title is required
    pub fn from_form(form: &MilestoneForm) -> DomainResult<Self> {
        Ok(Self {
            id: nested::new_item_id("ms"),
            title: required(&form.title, "Milestone title")?.to_string(),
            amount: parse_float_prefix(&form.amount).unwrap_or(0.0),
            due_date: form.due_date.clone(),
            ..Milestone::default()
        })
    }
}

// ========================
// Commands
// ========================

pub fn payouts_path() -> CollectionPath {
    CollectionPath::new(PayoutClient::COLLECTION)
}

/// Sub-collection holding milestones of records written before embedding
pub fn legacy_milestones_path(client_id: &str) -> CollectionPath {
    payouts_path().child(client_id, "milestones")
}

pub async fn create_payout(backend: &Backend, args: &NewPayoutArgs<'_>) -> DomainResult<Document> {
    let doc = backend.records.create(&payouts_path(), to_fields(args)?).await?;
    log::info!("Created payout client {} ({})", doc.id, args.name);
    Ok(doc)
}

pub async fn update_payout(backend: &Backend, id: &str, patch: Fields) -> DomainResult<()> {
    backend.records.update(&payouts_path(), id, patch).await
}

/// Write the milestone list and its recomputed `paidAmount` together
pub async fn write_milestones(
    backend: &Backend,
    client_id: &str,
    milestones: &[Milestone],
    legacy_ids: &[String],
) -> DomainResult<()> {
    let fields = patch([
        ("milestones", nested::to_value(&milestones)?),
        ("paidAmount", json_number(paid_total(milestones))),
    ]);
    if legacy_ids.is_empty() {
        return update_payout(backend, client_id, fields).await;
    }

    let legacy = legacy_milestones_path(client_id);
    let mut batch = WriteBatch::new();
    batch.update(&payouts_path(), client_id, fields);
    for id in legacy_ids {
        batch.delete(&legacy, id);
    }
    log::info!(
        "Moving {} legacy milestone(s) into payout client {}",
        legacy_ids.len(),
        client_id
    );
    backend.records.commit(batch).await
}

/// Delete a client together with any legacy milestone documents
pub async fn delete_payout(backend: &Backend, client_id: &str, legacy_ids: &[String]) -> DomainResult<()> {
    if legacy_ids.is_empty() {
        backend.records.delete(&payouts_path(), client_id).await?;
    } else {
        let legacy = legacy_milestones_path(client_id);
        let mut batch = WriteBatch::new();
        for id in legacy_ids {
            batch.delete(&legacy, id);
        }
        batch.delete(&payouts_path(), client_id);
        backend.records.commit(batch).await?;
    }
    log::info!("Deleted payout client {}", client_id);
    Ok(())
}

/// Renumber every client in one batch: `order` = position
pub async fn commit_order<'a>(
    backend: &Backend,
    positions: impl IntoIterator<Item = (&'a str, i64)>,
) -> DomainResult<()> {
    let path = payouts_path();
    let mut batch = WriteBatch::new();
    for (id, position) in positions {
        batch.update(&path, id, patch([("order", Value::from(position))]));
    }
    log::debug!("Committing payout order for {} client(s)", batch.len());
    backend.records.commit(batch).await
}
