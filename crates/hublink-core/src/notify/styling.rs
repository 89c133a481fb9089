//! Toast styling: severity mapping and the alert-type style table.
//!
//! The backend sends a numeric type enum and a free-text alert-type
//! tag. The numeric enum collapses to one of four display severities;
//! the tag selects a hand-mapped style record. Adding a new alert type
//! is a data change: one line in [`style_for`].

use std::time::Duration;

use crate::model::Severity;

/// Map the backend's numeric notification type (0-8) to a display
/// severity. Unknown codes default to `Info`.
///
/// 0 Info, 1 Success, 2 Warning, 3 Error, 4 System, 5 Stock, 6 Order,
/// 7 Payment, 8 Crm.
pub fn severity_for_type(kind: i64) -> Severity {
    match kind {
        1 | 7 => Severity::Success,
        2 | 5 => Severity::Warning,
        3 => Severity::Error,
        _ => Severity::Info,
    }
}

/// Presentation record for one known alert type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastStyle {
    pub severity: Severity,
    pub icon: &'static str,
    pub duration: Duration,
    pub action_label: Option<&'static str>,
}

const fn style(
    severity: Severity,
    icon: &'static str,
    duration_secs: u64,
    action_label: Option<&'static str>,
) -> ToastStyle {
    ToastStyle {
        severity,
        icon,
        duration: Duration::from_secs(duration_secs),
        action_label,
    }
}

/// Style record for a known alert-type tag, `None` for unknown tags.
pub fn style_for(alert_type: &str) -> Option<ToastStyle> {
    Some(match alert_type {
        "absence" => style(Severity::Warning, "alert-circle", 8, Some("Devamsızlığı Görüntüle")),
        "account_assigned" => style(Severity::Info, "building", 6, Some("Müşteriyi Görüntüle")),
        "account_marked_as_key_account" => style(Severity::Info, "star", 6, Some("Müşteriyi Görüntüle")),
        "activity_overdue" => style(Severity::Error, "clock", 12, Some("Aktiviteyi Görüntüle")),
        "announcement_published" => style(Severity::Info, "megaphone", 6, None),
        "backup_completed" => style(Severity::Success, "check-circle", 5, Some("Yedekleme Detayı")),
        "backup_failed" => style(Severity::Error, "alert-octagon", 12, Some("Yedekleme Detayı")),
        "birthday" => style(Severity::Info, "gift", 4, None),
        "bonus_awarded" => style(Severity::Success, "gift", 5, None),
        "call_missed" => style(Severity::Warning, "phone-missed", 8, Some("Aramayı Görüntüle")),
        "call_scheduled" => style(Severity::Info, "phone-clock", 6, Some("Aramayı Görüntüle")),
        "call_transferred" => style(Severity::Info, "phone-forwarded", 6, Some("Aramayı Görüntüle")),
        "campaign_launched" => style(Severity::Info, "megaphone", 6, Some("Kampanyayı Görüntüle")),
        "certification_expiring" => style(Severity::Warning, "award", 8, Some("Sertifikayı Görüntüle")),
        "competitor_report_created" => style(Severity::Info, "file-text", 6, Some("Rakip Analizini Görüntüle")),
        "competitor_threat_changed" => style(Severity::Warning, "alert-triangle", 8, Some("Rakip Analizini Görüntüle")),
        "contract_expiring" => style(Severity::Warning, "file-clock", 8, Some("Sözleşmeyi Görüntüle")),
        "contract_expiring_soon" => style(Severity::Warning, "alert-triangle", 8, Some("Sözleşmeyi Görüntüle")),
        "contract_renewed" => style(Severity::Success, "refresh-cw", 5, Some("Sözleşmeyi Görüntüle")),
        "contract_signed" => style(Severity::Success, "file-signature", 5, Some("Sözleşmeyi Görüntüle")),
        "credit_note_applied" => style(Severity::Success, "check-circle", 5, Some("Dekontu Görüntüle")),
        "credit_note_approved" => style(Severity::Success, "check-circle", 5, Some("Dekontu Görüntüle")),
        "credit_note_created" => style(Severity::Info, "file-minus", 6, Some("Dekontu Görüntüle")),
        "cycle_count_completed" => style(Severity::Success, "check-circle", 5, Some("Sayımı Görüntüle")),
        "deal_lost" => style(Severity::Error, "x-circle", 12, Some("Fırsatı Görüntüle")),
        "deal_rotten" => style(Severity::Warning, "alert-triangle", 8, Some("Fırsatı Görüntüle")),
        "deal_stage_changed" => style(Severity::Info, "git-branch", 6, Some("Fırsatı Görüntüle")),
        "deal_won" => style(Severity::Success, "trophy", 5, Some("Fırsatı Görüntüle")),
        "detractor_alert" => style(Severity::Warning, "alert-circle", 8, Some("Anketi Görüntüle")),
        "document_approval_requested" => style(Severity::Info, "file-check", 6, Some("Belgeyi Görüntüle")),
        "document_approved" => style(Severity::Success, "check-circle", 5, Some("Belgeyi Görüntüle")),
        "document_rejected" => style(Severity::Error, "x-circle", 12, Some("Belgeyi Görüntüle")),
        "document_shared" => style(Severity::Info, "file-text", 6, Some("Belgeyi Görüntüle")),
        "expense_approved" => style(Severity::Success, "check-circle", 5, Some("Masrafı Görüntüle")),
        "expense_budget_exceeded" => style(Severity::Error, "alert-octagon", 12, Some("Masrafı Görüntüle")),
        "expense_rejected" => style(Severity::Error, "x-circle", 12, Some("Masrafı Görüntüle")),
        "expense_submitted" => style(Severity::Info, "receipt", 6, Some("Masrafı Görüntüle")),
        "invoice_approved" => style(Severity::Success, "check-circle", 5, Some("Faturayı Görüntüle")),
        "invoice_cancelled" => style(Severity::Error, "x-circle", 12, Some("Faturayı Görüntüle")),
        "invoice_created" => style(Severity::Info, "file-invoice", 6, Some("Faturayı Görüntüle")),
        "invoice_overdue" => style(Severity::Error, "alert-triangle", 12, Some("Faturayı Görüntüle")),
        "invoice_paid" => style(Severity::Success, "credit-card", 5, Some("Faturayı Görüntüle")),
        "invoice_sent_to_gib" => style(Severity::Info, "send", 6, Some("Faturayı Görüntüle")),
        "late_arrival" => style(Severity::Info, "clock", 6, Some("Devamsızlığı Görüntüle")),
        "lead_assigned" => style(Severity::Info, "user-plus", 6, Some("Müşteri Adayını Görüntüle")),
        "lead_converted" => style(Severity::Success, "check-circle", 5, Some("Müşteri Adayını Görüntüle")),
        "lead_grade_changed" => style(Severity::Info, "award", 6, Some("Müşteri Adayını Görüntüle")),
        "lead_qualified" => style(Severity::Info, "star", 6, Some("Müşteri Adayını Görüntüle")),
        "lead_score_threshold" => style(Severity::Info, "trending-up", 6, Some("Müşteri Adayını Görüntüle")),
        "leave_balance_expiring" => style(Severity::Warning, "clock", 8, Some("İzin Talebini Görüntüle")),
        "leave_balance_low" => style(Severity::Warning, "alert-triangle", 8, Some("İzin Talebini Görüntüle")),
        "leave_request_approved" => style(Severity::Success, "check-circle", 5, Some("İzin Talebini Görüntüle")),
        "leave_request_rejected" => style(Severity::Error, "x-circle", 12, Some("İzin Talebini Görüntüle")),
        "leave_request_submitted" => style(Severity::Info, "calendar", 6, Some("İzin Talebini Görüntüle")),
        "lot_batch_expired" => style(Severity::Error, "alert-triangle", 12, Some("Lot Detayı")),
        "lot_batch_expiring" => style(Severity::Warning, "clock", 8, Some("Lot Detayı")),
        "lot_batch_quarantined" => style(Severity::Warning, "shield-alert", 8, Some("Lot Detayı")),
        "low_performance" => style(Severity::Warning, "alert-triangle", 8, None),
        "low_stock" => style(Severity::Warning, "warning", 8, Some("Stok Detayı")),
        "loyalty_points_expiring" => style(Severity::Warning, "alert-circle", 8, Some("Sadakat Programını Görüntüle")),
        "loyalty_tier_changed" => style(Severity::Info, "award", 6, Some("Sadakat Programını Görüntüle")),
        "mandatory_training_overdue" => style(Severity::Error, "alert-octagon", 12, Some("Eğitimi Görüntüle")),
        "meeting_cancelled" => style(Severity::Error, "calendar-x", 12, Some("Toplantıyı Görüntüle")),
        "meeting_reminder" => style(Severity::Info, "bell", 6, Some("Toplantıyı Görüntüle")),
        "opportunity_close_date_approaching" => style(Severity::Info, "calendar", 6, Some("Fırsatı Görüntüle")),
        "overtime" => style(Severity::Info, "clock", 6, Some("Mesaiyi Görüntüle")),
        "payment_allocated" => style(Severity::Info, "link", 6, Some("Ödemeyi Görüntüle")),
        "payment_confirmed" => style(Severity::Success, "check-circle", 5, Some("Ödemeyi Görüntüle")),
        "payment_failed" => style(Severity::Error, "alert-circle", 12, Some("Ödemeyi Görüntüle")),
        "payment_received" => style(Severity::Success, "banknotes", 5, Some("Ödemeyi Görüntüle")),
        "payment_refunded" => style(Severity::Info, "rotate-ccw", 6, Some("Ödemeyi Görüntüle")),
        "performance_review_due" => style(Severity::Info, "clock", 6, Some("Değerlendirmeyi Görüntüle")),
        "performance_review_submitted" => style(Severity::Info, "clipboard", 6, Some("Değerlendirmeyi Görüntüle")),
        "price_list_updated" => style(Severity::Info, "tag", 6, Some("Fiyat Listesini Görüntüle")),
        "probation_ending" => style(Severity::Info, "clock", 6, Some("Personeli Görüntüle")),
        "product_interest_converted" => style(Severity::Success, "zap", 5, Some("Ürün İlgisini Görüntüle")),
        "product_interest_followup" => style(Severity::Info, "calendar", 6, Some("Ürün İlgisini Görüntüle")),
        "quotation_accepted" => style(Severity::Success, "check-circle", 5, Some("Teklifi Görüntüle")),
        "quotation_created" => style(Severity::Info, "file-text", 6, Some("Teklifi Görüntüle")),
        "quotation_expired" => style(Severity::Error, "clock", 12, Some("Teklifi Görüntüle")),
        "quotation_expiring" => style(Severity::Warning, "alert-triangle", 8, Some("Teklifi Görüntüle")),
        "quotation_rejected" => style(Severity::Error, "x-circle", 12, Some("Teklifi Görüntüle")),
        "quotation_sent" => style(Severity::Info, "send", 6, Some("Teklifi Görüntüle")),
        "quote_accepted" => style(Severity::Success, "check-circle", 5, Some("Teklifi Görüntüle")),
        "quote_converted" => style(Severity::Success, "shopping-cart", 5, Some("Teklifi Görüntüle")),
        "quote_expiring_soon" => style(Severity::Warning, "clock", 8, Some("Teklifi Görüntüle")),
        "referral_converted" => style(Severity::Success, "user-plus", 5, Some("Referansı Görüntüle")),
        "referral_reward_earned" => style(Severity::Success, "gift", 5, Some("Referansı Görüntüle")),
        "reminder_due" => style(Severity::Info, "bell", 6, Some("Hatırlatıcıyı Görüntüle")),
        "salary_paid" => style(Severity::Success, "dollar-sign", 5, Some("Bordroyu Görüntüle")),
        "sales_order_cancelled" => style(Severity::Error, "x-circle", 12, Some("Siparişi Görüntüle")),
        "sales_order_confirmed" => style(Severity::Success, "check-circle", 5, Some("Siparişi Görüntüle")),
        "sales_order_created" => style(Severity::Info, "shopping-cart", 6, Some("Siparişi Görüntüle")),
        "sales_order_delivered" => style(Severity::Success, "package-check", 5, Some("Siparişi Görüntüle")),
        "sales_order_partially_shipped" => style(Severity::Info, "truck", 6, Some("Siparişi Görüntüle")),
        "sales_order_shipped" => style(Severity::Info, "truck", 6, Some("Siparişi Görüntüle")),
        "sales_return_approved" => style(Severity::Success, "check-circle", 5, Some("İadeyi Görüntüle")),
        "sales_return_created" => style(Severity::Info, "rotate-ccw", 6, Some("İadeyi Görüntüle")),
        "sales_return_received" => style(Severity::Success, "package-check", 5, Some("İadeyi Görüntüle")),
        "sales_return_refunded" => style(Severity::Info, "credit-card", 6, Some("İadeyi Görüntüle")),
        "sales_return_rejected" => style(Severity::Error, "x-circle", 12, Some("İadeyi Görüntüle")),
        "sales_team_manager_changed" => style(Severity::Info, "user-check", 6, Some("Satış Ekibini Görüntüle")),
        "sales_team_member_added" => style(Severity::Info, "users", 6, Some("Satış Ekibini Görüntüle")),
        "sales_team_quota_reached" => style(Severity::Info, "target", 6, Some("Satış Ekibini Görüntüle")),
        "serial_number_defective" => style(Severity::Error, "alert-circle", 12, Some("Seri No Detayı")),
        "serial_number_lost" => style(Severity::Error, "search-x", 12, Some("Seri No Detayı")),
        "shipment_created" => style(Severity::Info, "package", 6, Some("Sevkiyatı Görüntüle")),
        "shipment_delivered" => style(Severity::Success, "package-check", 5, Some("Sevkiyatı Görüntüle")),
        "shipment_delivery_failed" => style(Severity::Error, "alert-triangle", 12, Some("Sevkiyatı Görüntüle")),
        "shipment_dispatched" => style(Severity::Info, "truck", 6, Some("Sevkiyatı Görüntüle")),
        "shipment_status_updated" => style(Severity::Info, "map-pin", 6, Some("Sevkiyatı Görüntüle")),
        "stock_adjustment_applied" => style(Severity::Info, "refresh-cw", 6, Some("Stok Detayı")),
        "stock_count_approved" => style(Severity::Success, "check-circle", 5, Some("Stok Detayı")),
        "stock_count_cancelled" => style(Severity::Error, "x-circle", 12, Some("Stok Detayı")),
        "stock_count_completed" => style(Severity::Success, "check-circle", 5, Some("Stok Detayı")),
        "stock_count_rejected" => style(Severity::Error, "x-circle", 12, Some("Stok Detayı")),
        "stock_count_scheduled" => style(Severity::Info, "calendar", 6, Some("Stok Detayı")),
        "stock_count_started" => style(Severity::Info, "play-circle", 6, Some("Stok Detayı")),
        "survey_completed" => style(Severity::Success, "clipboard-check", 5, Some("Anketi Görüntüle")),
        "survey_followup_required" => style(Severity::Info, "user-check", 6, Some("Anketi Görüntüle")),
        "task_assigned" => style(Severity::Info, "clipboard", 6, Some("Görevi Görüntüle")),
        "task_completed" => style(Severity::Success, "check-square", 5, Some("Görevi Görüntüle")),
        "task_due_date_approaching" => style(Severity::Info, "calendar", 6, Some("Görevi Görüntüle")),
        "task_overdue" => style(Severity::Error, "alert-circle", 12, Some("Görevi Görüntüle")),
        "task_reminder" => style(Severity::Info, "bell", 6, Some("Görevi Görüntüle")),
        "territory_user_assigned" => style(Severity::Info, "map", 6, Some("Bölgeyi Görüntüle")),
        "ticket_assigned" => style(Severity::Info, "ticket", 6, Some("Destek Talebini Görüntüle")),
        "ticket_escalated" => style(Severity::Warning, "arrow-up-circle", 8, Some("Destek Talebini Görüntüle")),
        "ticket_resolved" => style(Severity::Success, "check-circle", 5, Some("Destek Talebini Görüntüle")),
        "ticket_sla_breached" => style(Severity::Error, "alert-octagon", 12, Some("Destek Talebini Görüntüle")),
        "ticket_sla_warning" => style(Severity::Warning, "alert-triangle", 8, Some("Destek Talebini Görüntüle")),
        "training_deadline_approaching" => style(Severity::Info, "clock", 6, Some("Eğitimi Görüntüle")),
        "training_enrollment" => style(Severity::Info, "book", 6, Some("Eğitimi Görüntüle")),
        "upcoming_holiday" => style(Severity::Info, "calendar", 6, None),
        "user_mentioned_in_note" => style(Severity::Info, "at-sign", 6, Some("Notu Görüntüle")),
        "warranty_claim_approved" => style(Severity::Success, "check-circle", 5, Some("Garantiyi Görüntüle")),
        "warranty_claim_created" => style(Severity::Warning, "alert-circle", 8, Some("Garantiyi Görüntüle")),
        "warranty_claim_rejected" => style(Severity::Error, "x-circle", 12, Some("Garantiyi Görüntüle")),
        "warranty_expired" => style(Severity::Error, "shield-off", 12, Some("Garantiyi Görüntüle")),
        "warranty_expiring" => style(Severity::Warning, "clock", 8, Some("Garantiyi Görüntüle")),
        "warranty_registered" => style(Severity::Success, "shield-check", 5, Some("Garantiyi Görüntüle")),
        "work_anniversary" => style(Severity::Info, "cake", 4, None),
        "workflow_execution_failed" => style(Severity::Error, "alert-octagon", 12, Some("İş Akışını Görüntüle")),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_types_collapse_to_four_severities() {
        assert_eq!(severity_for_type(0), Severity::Info);
        assert_eq!(severity_for_type(1), Severity::Success);
        assert_eq!(severity_for_type(2), Severity::Warning);
        assert_eq!(severity_for_type(3), Severity::Error);
        assert_eq!(severity_for_type(4), Severity::Info);
        assert_eq!(severity_for_type(5), Severity::Warning);
        assert_eq!(severity_for_type(6), Severity::Info);
        assert_eq!(severity_for_type(7), Severity::Success);
        assert_eq!(severity_for_type(8), Severity::Info);
    }

    #[test]
    fn unknown_numeric_type_defaults_to_info() {
        assert_eq!(severity_for_type(-1), Severity::Info);
        assert_eq!(severity_for_type(99), Severity::Info);
    }

    #[test]
    fn overdue_invoice_styles_as_long_error_with_action() {
        let style = style_for("invoice_overdue").unwrap();
        assert_eq!(style.severity, Severity::Error);
        assert_eq!(style.duration, Duration::from_secs(12));
        assert_eq!(style.action_label, Some("Faturayı Görüntüle"));
    }

    #[test]
    fn unknown_alert_type_has_no_style() {
        assert!(style_for("definitely_not_mapped").is_none());
        assert!(style_for("").is_none());
    }

    #[test]
    fn sample_entries_spot_checked() {
        let won = style_for("deal_won").unwrap();
        assert_eq!(won.severity, Severity::Success);
        assert_eq!(won.icon, "trophy");

        let sla = style_for("ticket_sla_breached").unwrap();
        assert_eq!(sla.severity, Severity::Error);

        let backup = style_for("backup_failed").unwrap();
        assert_eq!(backup.severity, Severity::Error);
        assert_eq!(backup.action_label, Some("Yedekleme Detayı"));

        let birthday = style_for("birthday").unwrap();
        assert_eq!(birthday.severity, Severity::Info);
        assert!(birthday.action_label.is_none());
    }
}
