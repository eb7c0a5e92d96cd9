/// Recurring invoice generator tests
///
/// Run with: cargo test --test recurring_invoices_tests

mod common;

use common::{date, dec, Fixture};
use gymbill_shared::billing::{OverdueSweeper, Outcome, RecurringInvoiceGenerator, SkipReason};
use gymbill_shared::calendar::PeriodReference;
use gymbill_shared::models::invoice::InvoiceStatus;
use gymbill_shared::models::membership::Membership;
use gymbill_shared::models::plan::PeriodUnit;
use gymbill_shared::store::memory::Faults;
use gymbill_shared::store::BillingStore;
use std::collections::HashSet;
use uuid::Uuid;

fn generator(fixture: &Fixture) -> RecurringInvoiceGenerator {
    RecurringInvoiceGenerator::new(fixture.store.clone(), fixture.clock.clone())
}

#[tokio::test]
async fn test_generates_invoice_for_next_billing_day() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    let membership = fixture.membership(&plan, date(2024, 1, 10), 5).await;

    let summary = generator(&fixture).run_today(None).await.unwrap();

    assert_eq!(summary.run_date, date(2024, 2, 1));
    assert_eq!(summary.total_processed, 1);
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.end_date_rollovers, 1);

    let receivables = fixture.store.receivables().await;
    assert_eq!(receivables.len(), 1);
    let invoice = &receivables[0];
    assert_eq!(invoice.due_date, date(2024, 2, 5));
    assert_eq!(invoice.period_reference, PeriodReference::parse("02/2024"));
    assert_eq!(invoice.final_amount, dec("150.00"));
    assert_eq!(invoice.remaining_amount, dec("150.00"));
    assert_eq!(invoice.paid_amount, dec("0"));
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.membership_id, Some(membership.id));
    assert_eq!(invoice.category, "membership");

    let rolled = fixture.store.membership(membership.id).await.unwrap();
    assert_eq!(rolled.end_date, date(2024, 2, 10));
}

#[tokio::test]
async fn test_rerun_on_same_day_is_idempotent() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    let membership = fixture.membership(&plan, date(2024, 1, 10), 5).await;
    let generator = generator(&fixture);

    let first = generator.run_today(None).await.unwrap();
    let second = generator.run_today(None).await.unwrap();

    assert_eq!(first.generated, 1);
    assert_eq!(second.generated, 0);
    assert_eq!(second.already_existed, 1);
    assert_eq!(second.end_date_rollovers, 0);

    let existing_id = fixture.store.receivables().await[0].id;
    assert_eq!(
        second.outcome_for(membership.id),
        Some(&Outcome::AlreadyExisted {
            receivable_id: Some(existing_id),
            period_reference: PeriodReference::from_date(date(2024, 2, 5)),
        })
    );

    // End date rolled once, not twice
    let rolled = fixture.store.membership(membership.id).await.unwrap();
    assert_eq!(rolled.end_date, date(2024, 2, 10));
    assert_eq!(fixture.store.receivables().await.len(), 1);
}

#[tokio::test]
async fn test_passed_billing_day_bills_next_month() {
    let fixture = Fixture::on(date(2024, 2, 20));
    let plan = fixture.monthly_plan("99.90").await;
    fixture.membership(&plan, date(2024, 1, 10), 5).await;

    generator(&fixture).run_today(None).await.unwrap();

    let invoice = &fixture.store.receivables().await[0];
    assert_eq!(invoice.due_date, date(2024, 3, 5));
    assert_eq!(invoice.period_reference.as_ref().map(|p| p.as_str()), Some("03/2024"));
}

#[tokio::test]
async fn test_billing_day_31_clamps_in_short_month() {
    let fixture = Fixture::on(date(2024, 4, 2));
    let plan = fixture.monthly_plan("100.00").await;
    fixture.membership(&plan, date(2024, 1, 31), 31).await;

    generator(&fixture).run_today(None).await.unwrap();

    let invoice = &fixture.store.receivables().await[0];
    assert_eq!(invoice.due_date, date(2024, 4, 30));
}

#[tokio::test]
async fn test_discount_reduces_final_amount() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("200.00").await;
    let discount = fixture.percentage_discount("15").await;
    let membership = fixture.membership(&plan, date(2024, 1, 10), 5).await;
    fixture
        .save_membership(Membership {
            discount_id: Some(discount.id),
            ..membership
        })
        .await;

    generator(&fixture).run_today(None).await.unwrap();

    let invoice = &fixture.store.receivables().await[0];
    assert_eq!(invoice.original_amount, dec("200.00"));
    assert_eq!(invoice.discount_amount, dec("30.00"));
    assert_eq!(invoice.final_amount, dec("170.00"));
    assert_eq!(invoice.discount_id, Some(discount.id));
}

#[tokio::test]
async fn test_full_discount_invoice_starts_paid() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("100.00").await;
    let discount = fixture.percentage_discount("100").await;
    let membership = fixture.membership(&plan, date(2024, 1, 10), 5).await;
    fixture
        .save_membership(Membership {
            discount_id: Some(discount.id),
            ..membership
        })
        .await;

    let summary = generator(&fixture).run_today(None).await.unwrap();
    assert_eq!(summary.generated, 1);

    let invoice = &fixture.store.receivables().await[0];
    assert_eq!(invoice.discount_amount, dec("100.00"));
    assert_eq!(invoice.final_amount, dec("0.00"));
    assert_eq!(invoice.remaining_amount, dec("0.00"));
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert!(invoice.paid_at.is_some());

    // Nothing owed, so the sweep leaves it alone after the due date
    let sweep = OverdueSweeper::new(fixture.store.clone())
        .sweep(date(2024, 2, 10), None)
        .await
        .unwrap();
    assert_eq!(sweep.updated_count, 0);
    assert_eq!(fixture.store.receivables().await[0].status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_missing_discount_bills_full_price() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("200.00").await;
    let membership = fixture.membership(&plan, date(2024, 1, 10), 5).await;
    fixture
        .save_membership(Membership {
            discount_id: Some(Uuid::new_v4()),
            ..membership
        })
        .await;

    let summary = generator(&fixture).run_today(None).await.unwrap();

    assert_eq!(summary.generated, 1);
    let invoice = &fixture.store.receivables().await[0];
    assert_eq!(invoice.final_amount, dec("200.00"));
    assert_eq!(invoice.discount_id, None);
}

#[tokio::test]
async fn test_membership_starting_next_month_is_skipped() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    let membership = fixture.membership(&plan, date(2024, 3, 1), 5).await;

    let summary = generator(&fixture).run_today(None).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(
        summary.outcome_for(membership.id),
        Some(&Outcome::Skipped {
            reason: SkipReason::NotStarted
        })
    );
    assert!(fixture.store.receivables().await.is_empty());
}

#[tokio::test]
async fn test_membership_starting_later_this_month_is_billed() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    fixture.membership(&plan, date(2024, 2, 20), 5).await;

    let summary = generator(&fixture).run_today(None).await.unwrap();

    assert_eq!(summary.generated, 1);
}

#[tokio::test]
async fn test_expired_plan_is_skipped() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let mut plan = fixture.monthly_plan("150.00").await;
    plan.duration_months = Some(3);
    let plan = fixture.save_plan(plan).await;
    let membership = fixture.membership(&plan, date(2023, 6, 1), 5).await;

    let summary = generator(&fixture).run_today(None).await.unwrap();

    assert_eq!(
        summary.outcome_for(membership.id),
        Some(&Outcome::Skipped {
            reason: SkipReason::PlanExpired
        })
    );
    assert!(fixture.store.receivables().await.is_empty());
}

#[tokio::test]
async fn test_quarterly_plan_rolls_end_date_three_months() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.plan(PeriodUnit::NMonths, 3, "400.00").await;
    let membership = fixture.membership(&plan, date(2024, 1, 31), 5).await;

    generator(&fixture).run_today(None).await.unwrap();

    let rolled = fixture.store.membership(membership.id).await.unwrap();
    assert_eq!(rolled.end_date, date(2024, 4, 30));
}

#[tokio::test]
async fn test_one_failing_membership_does_not_stop_the_batch() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    let failing = fixture.membership(&plan, date(2024, 1, 10), 5).await;
    let healthy = fixture.membership(&plan, date(2024, 1, 12), 8).await;

    fixture
        .store
        .set_faults(Faults {
            fail_receivable_insert_for: HashSet::from([failing.id]),
            ..Faults::default()
        })
        .await;

    let summary = generator(&fixture).run_today(None).await.unwrap();

    assert_eq!(summary.total_processed, 2);
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.errored, 1);
    assert!(matches!(
        summary.outcome_for(failing.id),
        Some(Outcome::Failed { kind: "database", .. })
    ));
    assert!(matches!(
        summary.outcome_for(healthy.id),
        Some(Outcome::Generated { .. })
    ));

    // The failed membership keeps its end date
    let untouched = fixture.store.membership(failing.id).await.unwrap();
    assert_eq!(untouched.end_date, failing.end_date);
}

#[tokio::test]
async fn test_end_date_failure_keeps_generated_invoice() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    let membership = fixture.membership(&plan, date(2024, 1, 10), 5).await;

    fixture
        .store
        .set_faults(Faults {
            fail_end_date_update: true,
            ..Faults::default()
        })
        .await;

    let summary = generator(&fixture).run_today(None).await.unwrap();

    assert_eq!(summary.generated, 1);
    assert_eq!(summary.end_date_rollovers, 0);
    assert!(matches!(
        summary.outcome_for(membership.id),
        Some(Outcome::Generated {
            end_date_rolled: false,
            ..
        })
    ));
    assert_eq!(fixture.store.receivables().await.len(), 1);

    let unchanged = fixture.store.membership(membership.id).await.unwrap();
    assert_eq!(unchanged.end_date, date(2024, 1, 10));
}

#[tokio::test]
async fn test_cancelled_invoice_does_not_block_regeneration() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    fixture.membership(&plan, date(2024, 1, 10), 5).await;
    let generator = generator(&fixture);

    generator.run_today(None).await.unwrap();
    let first = fixture.store.receivables().await[0].clone();
    fixture
        .store
        .cancel_receivable(first.id, fixture.tenant_id)
        .await
        .unwrap();

    let summary = generator.run_today(None).await.unwrap();

    assert_eq!(summary.generated, 1);
    let receivables = fixture.store.receivables().await;
    assert_eq!(receivables.len(), 2);
    assert_eq!(
        receivables
            .iter()
            .filter(|r| r.status == InvoiceStatus::Pending)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_run_can_be_limited_to_one_tenant() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    fixture.membership(&plan, date(2024, 1, 10), 5).await;

    let other = Fixture {
        store: fixture.store.clone(),
        clock: fixture.clock.clone(),
        tenant_id: Uuid::new_v4(),
    };
    let other_plan = other.monthly_plan("80.00").await;
    other.membership(&other_plan, date(2024, 1, 10), 5).await;

    let summary = generator(&fixture)
        .run_today(Some(fixture.tenant_id))
        .await
        .unwrap();

    assert_eq!(summary.tenant_id, Some(fixture.tenant_id));
    assert_eq!(summary.total_processed, 1);
    let receivables = fixture.store.receivables().await;
    assert_eq!(receivables.len(), 1);
    assert_eq!(receivables[0].tenant_id, fixture.tenant_id);
}

#[tokio::test]
async fn test_summary_serializes_outcomes() {
    let fixture = Fixture::on(date(2024, 2, 1));
    let plan = fixture.monthly_plan("150.00").await;
    fixture.membership(&plan, date(2024, 3, 1), 5).await;

    let summary = generator(&fixture).run_today(None).await.unwrap();
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["skipped"], 1);
    assert_eq!(json["details"][0]["outcome"], "skipped");
    assert_eq!(json["details"][0]["reason"], "not_started");
}
