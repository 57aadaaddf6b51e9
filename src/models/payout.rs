use serde::{Deserialize, Serialize};

use super::{labelled_enum, lenient, NestedItem, Record};

labelled_enum!(
    PayoutStatus, default = Active, {
        Active => "Active",
        Completed => "Completed",
        Overdue => "Overdue",
    }
);

labelled_enum!(
    MilestoneStatus, default = Pending, {
        Pending => "Pending",
        Paid => "Paid",
        Overdue => "Overdue",
    }
);

impl MilestoneStatus {
    /// Paid <-> Pending; anything not paid becomes paid
    pub fn toggled(&self) -> MilestoneStatus {
        match self {
            MilestoneStatus::Paid => MilestoneStatus::Pending,
            _ => MilestoneStatus::Paid,
        }
    }
}

/// Payment milestone embedded in a payout client's `milestones` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Milestone {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::number")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub due_date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: MilestoneStatus,
}

impl NestedItem for Milestone {
    fn item_id(&self) -> &str {
        &self.id
    }
}

/// Sum of paid milestone amounts
pub fn paid_total(milestones: &[Milestone]) -> f64 {
    milestones
        .iter()
        .filter(|m| m.status == MilestoneStatus::Paid)
        .map(|m| m.amount)
        .sum()
}

/// `payouts` collection
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayoutClient {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub project: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: PayoutStatus,
    #[serde(deserialize_with = "lenient::string")]
    pub due_date: String,
    #[serde(deserialize_with = "lenient::number")]
    pub total_budget: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub paid_amount: f64,
    /// Display position; absent on records that were never reordered
    #[serde(deserialize_with = "lenient::or_default")]
    pub order: Option<i64>,
    /// `None` when the record predates embedded milestones
    #[serde(deserialize_with = "lenient::optional_list")]
    pub milestones: Option<Vec<Milestone>>,
}

impl Record for PayoutClient {
    const COLLECTION: &'static str = "payouts";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Milestone {
    /// Decode a milestone stored as its own document
    pub fn from_document(doc: &pm_console_backend::Document) -> pm_console_backend::DomainResult<Self> {
        Ok(serde_json::from_value(doc.to_value())?)
    }
}

impl PayoutClient {
    /// Paid share of the budget, rounded to whole percent
    pub fn percent_paid(&self) -> i64 {
        if self.total_budget == 0.0 {
            return 0;
        }
        (self.paid_amount / self.total_budget * 100.0).round() as i64
    }

    /// Value shown in an edit cell
    pub fn field_text(&self, field: &str) -> String {
        match field {
            "name" => self.name.clone(),
            "project" => self.project.clone(),
            "status" => self.status.to_string(),
            "dueDate" => self.due_date.clone(),
            "totalBudget" => format_amount(self.total_budget),
            "paidAmount" => format_amount(self.paid_amount),
            _ => String::new(),
        }
    }
}

/// `1500` for whole numbers, `1500.5` otherwise
pub(crate) fn format_amount(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_console_backend::{fields, Document};
    use serde_json::json;

    fn milestone(amount: f64, status: MilestoneStatus) -> Milestone {
        Milestone {
            amount,
            status,
            ..Milestone::default()
        }
    }

    #[test]
    fn test_paid_total_counts_paid_only() {
        let list = vec![
            milestone(500.0, MilestoneStatus::Paid),
            milestone(250.0, MilestoneStatus::Pending),
            milestone(100.0, MilestoneStatus::Paid),
            milestone(75.0, MilestoneStatus::Overdue),
        ];
        assert_eq!(paid_total(&list), 600.0);
        assert_eq!(paid_total(&[]), 0.0);
    }

    #[test]
    fn test_toggle() {
        assert_eq!(MilestoneStatus::Paid.toggled(), MilestoneStatus::Pending);
        assert_eq!(MilestoneStatus::Pending.toggled(), MilestoneStatus::Paid);
        assert_eq!(MilestoneStatus::Overdue.toggled(), MilestoneStatus::Paid);
    }

    #[test]
    fn test_decode_numbers_leniently() {
        let doc = Document::new(
            "c1",
            fields(json!({"totalBudget": "1200.50", "paidAmount": "abc", "order": 2})),
        );
        let client = PayoutClient::from_document(&doc).unwrap();
        assert_eq!(client.total_budget, 1200.5);
        assert_eq!(client.paid_amount, 0.0);
        assert_eq!(client.order, Some(2));
        assert_eq!(client.milestones, None);
        assert_eq!(client.field_text("totalBudget"), "1200.5");
    }

    #[test]
    fn test_percent_paid() {
        let client = PayoutClient {
            total_budget: 3000.0,
            paid_amount: 1000.0,
            ..PayoutClient::default()
        };
        assert_eq!(client.percent_paid(), 33);
        assert_eq!(PayoutClient::default().percent_paid(), 0);
    }
}
