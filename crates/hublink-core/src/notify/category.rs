//! Category derivation from the free-text alert-type tag.
//!
//! The backend does not send an explicit category; it is inferred by
//! substring matching against per-category keyword lists, evaluated in
//! a fixed priority order. Inventory wins over sales, sales over CRM,
//! and so on down the table; anything unmatched is `System`.

use crate::model::Category;

const INVENTORY_KEYWORDS: &[&str] = &[
    "stock",
    "inventory",
    "warehouse",
    "lot_batch",
    "serial_number",
    "cycle_count",
    "price_list",
];

const SALES_KEYWORDS: &[&str] = &[
    "sales_order",
    "sales_return",
    "sales_team",
    "quotation",
    "quote",
    "invoice",
    "shipment",
    "order",
    "warranty",
    "contract",
];

const CRM_KEYWORDS: &[&str] = &[
    "lead",
    "deal",
    "opportunity",
    "account",
    "customer",
    "campaign",
    "ticket",
    "meeting",
    "call",
    "task",
    "activity",
    "survey",
    "referral",
    "loyalty",
    "territory",
    "competitor",
    "document",
    "mention",
    "reminder",
    "detractor",
    "product_interest",
    "crm",
];

const HR_KEYWORDS: &[&str] = &[
    "leave",
    "expense",
    "salary",
    "payroll",
    "employee",
    "training",
    "performance",
    "certification",
    "probation",
    "overtime",
    "absence",
    "late_arrival",
    "birthday",
    "anniversary",
    "holiday",
    "announcement",
    "bonus",
    "hr",
];

const BACKUP_KEYWORDS: &[&str] = &["backup", "restore"];

const FINANCE_KEYWORDS: &[&str] = &["payment", "credit_note", "refund", "bank", "finance"];

const TABLE: &[(Category, &[&str])] = &[
    (Category::Inventory, INVENTORY_KEYWORDS),
    (Category::Sales, SALES_KEYWORDS),
    (Category::Crm, CRM_KEYWORDS),
    (Category::Hr, HR_KEYWORDS),
    (Category::Backup, BACKUP_KEYWORDS),
    (Category::Finance, FINANCE_KEYWORDS),
];

/// Derive the business category for an alert-type tag. Pure; the same
/// input always yields the same category.
pub fn determine_category(alert_type: &str) -> Category {
    let tag = alert_type.to_ascii_lowercase();
    for (category, keywords) in TABLE {
        if keywords.iter().any(|keyword| tag.contains(keyword)) {
            return *category;
        }
    }
    Category::System
}
