/// Cash drawer service tests
///
/// Run with: cargo test --test cash_drawer_tests

mod common;

use common::{date, dec, Fixture};
use gymbill_shared::cash::DrawerService;
use gymbill_shared::error::BillingError;
use gymbill_shared::models::cash_drawer::{DrawerStatus, MovementKind, NewMovement};
use gymbill_shared::models::invoice::PaymentMethod;
use uuid::Uuid;

fn drawers(fixture: &Fixture) -> DrawerService {
    DrawerService::new(fixture.store.clone(), fixture.clock.clone())
}

fn sale(amount: &str, method: PaymentMethod) -> NewMovement {
    NewMovement::new(MovementKind::In, dec(amount), "Water bottle", method, "store")
}

#[tokio::test]
async fn test_open_drawer_starts_with_opening_amount() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);

    let drawer = service.open(fixture.tenant_id, dec("100.00"), None).await.unwrap();

    assert_eq!(drawer.number, 1);
    assert_eq!(drawer.status, DrawerStatus::Open);
    assert_eq!(drawer.expected_balance(), dec("100.00"));

    let open = service.open_drawer(fixture.tenant_id).await.unwrap();
    assert_eq!(open.id, drawer.id);
}

#[tokio::test]
async fn test_second_open_drawer_is_rejected() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    service.open(fixture.tenant_id, dec("100.00"), None).await.unwrap();

    let result = service.open(fixture.tenant_id, dec("50.00"), None).await;

    assert!(matches!(result, Err(BillingError::Conflict(_))));
}

#[tokio::test]
async fn test_other_tenants_can_open_their_own_drawer() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    service.open(fixture.tenant_id, dec("100.00"), None).await.unwrap();

    let other = service.open(Uuid::new_v4(), dec("10.00"), None).await.unwrap();

    assert_eq!(other.number, 1);
}

#[tokio::test]
async fn test_negative_opening_amount_is_rejected() {
    let fixture = Fixture::on(date(2024, 5, 2));

    let result = drawers(&fixture).open(fixture.tenant_id, dec("-1"), None).await;

    assert!(matches!(
        result,
        Err(BillingError::Validation { ref field, .. }) if field == "opening_amount"
    ));
}

#[tokio::test]
async fn test_no_open_drawer_is_not_found() {
    let fixture = Fixture::on(date(2024, 5, 2));

    let result = drawers(&fixture).open_drawer(fixture.tenant_id).await;

    assert!(matches!(result, Err(BillingError::NotFound(_))));
}

#[tokio::test]
async fn test_movements_update_totals() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let tenant_id = fixture.tenant_id;
    let drawer = service.open(tenant_id, dec("100.00"), None).await.unwrap();

    service
        .post_movement(tenant_id, drawer.id, sale("12.50", PaymentMethod::Cash))
        .await
        .unwrap();
    service
        .supply(tenant_id, drawer.id, dec("50.00"), None, None)
        .await
        .unwrap();
    service
        .withdraw(tenant_id, drawer.id, dec("30.00"), Some("Bank deposit".to_string()), None)
        .await
        .unwrap();

    let open = service.open_drawer(tenant_id).await.unwrap();
    assert_eq!(open.total_in, dec("62.50"));
    assert_eq!(open.total_out, dec("30.00"));
    assert_eq!(open.expected_balance(), dec("132.50"));
    assert_eq!(open.movements.len(), 3);
}

#[tokio::test]
async fn test_withdrawal_cannot_exceed_balance() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let drawer = service.open(fixture.tenant_id, dec("100.00"), None).await.unwrap();

    let result = service
        .withdraw(fixture.tenant_id, drawer.id, dec("100.01"), None, None)
        .await;
    assert!(matches!(result, Err(BillingError::Conflict(_))));

    // Exactly the balance is allowed
    let movement = service
        .withdraw(fixture.tenant_id, drawer.id, dec("100.00"), None, None)
        .await
        .unwrap();
    assert_eq!(movement.category, "withdrawal");
    assert_eq!(movement.description, "Cash withdrawal");

    let open = service.open_drawer(fixture.tenant_id).await.unwrap();
    assert_eq!(open.expected_balance(), dec("0"));
}

#[tokio::test]
async fn test_zero_amount_movement_is_rejected() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let drawer = service.open(fixture.tenant_id, dec("0"), None).await.unwrap();

    let result = service
        .post_movement(fixture.tenant_id, drawer.id, sale("0", PaymentMethod::Pix))
        .await;

    assert!(matches!(
        result,
        Err(BillingError::Validation { ref field, .. }) if field == "amount"
    ));
}

#[tokio::test]
async fn test_removing_movement_reverses_totals() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let tenant_id = fixture.tenant_id;
    let drawer = service.open(tenant_id, dec("20.00"), None).await.unwrap();
    let movement = service
        .post_movement(tenant_id, drawer.id, sale("15.00", PaymentMethod::DebitCard))
        .await
        .unwrap();

    service.remove_movement(tenant_id, drawer.id, movement.id).await.unwrap();

    let open = service.open_drawer(tenant_id).await.unwrap();
    assert_eq!(open.total_in, dec("0"));
    assert_eq!(open.expected_balance(), dec("20.00"));
    assert!(open.movements.is_empty());

    let again = service.remove_movement(tenant_id, drawer.id, movement.id).await;
    assert!(matches!(again, Err(BillingError::NotFound(_))));
}

#[tokio::test]
async fn test_close_records_difference() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let tenant_id = fixture.tenant_id;
    let drawer = service.open(tenant_id, dec("100.00"), None).await.unwrap();
    service
        .post_movement(tenant_id, drawer.id, sale("40.00", PaymentMethod::Cash))
        .await
        .unwrap();

    let (closed, summary) = service.close(tenant_id, drawer.id, dec("135.00"), None).await.unwrap();

    assert_eq!(closed.status, DrawerStatus::Closed);
    assert_eq!(summary.expected_balance, dec("140.00"));
    assert_eq!(summary.difference, dec("-5.00"));
    assert_eq!(summary.note, "shortage of 5.00");
    assert_eq!(closed.closing_difference, Some(dec("-5.00")));
}

#[tokio::test]
async fn test_closed_drawer_is_immutable() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let tenant_id = fixture.tenant_id;
    let drawer = service.open(tenant_id, dec("100.00"), None).await.unwrap();
    let movement = service
        .post_movement(tenant_id, drawer.id, sale("10.00", PaymentMethod::Cash))
        .await
        .unwrap();
    service.close(tenant_id, drawer.id, dec("110.00"), None).await.unwrap();

    let post = service
        .post_movement(tenant_id, drawer.id, sale("1.00", PaymentMethod::Cash))
        .await;
    let remove = service.remove_movement(tenant_id, drawer.id, movement.id).await;
    let close = service.close(tenant_id, drawer.id, dec("110.00"), None).await;

    assert!(matches!(post, Err(BillingError::Conflict(_))));
    assert!(matches!(remove, Err(BillingError::Conflict(_))));
    assert!(matches!(close, Err(BillingError::Conflict(_))));
}

#[tokio::test]
async fn test_new_drawer_after_close_gets_next_number() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let tenant_id = fixture.tenant_id;
    let first = service.open(tenant_id, dec("100.00"), None).await.unwrap();
    service.close(tenant_id, first.id, dec("100.00"), None).await.unwrap();

    let second = service.open(tenant_id, dec("100.00"), None).await.unwrap();

    assert_eq!(second.number, 2);
}

#[tokio::test]
async fn test_report_groups_movements() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let tenant_id = fixture.tenant_id;
    let drawer = service.open(tenant_id, dec("50.00"), None).await.unwrap();
    for movement in [
        sale("10.00", PaymentMethod::Cash),
        sale("25.00", PaymentMethod::Pix),
        sale("5.00", PaymentMethod::Cash),
    ] {
        service.post_movement(tenant_id, drawer.id, movement).await.unwrap();
    }
    service
        .withdraw(tenant_id, drawer.id, dec("20.00"), None, None)
        .await
        .unwrap();

    let report = service.report(tenant_id, drawer.id).await.unwrap();

    assert_eq!(report.movement_count, 4);
    assert_eq!(report.expected_balance, dec("70.00"));
    assert_eq!(report.inflows_by_method.get(&PaymentMethod::Cash), Some(&dec("15.00")));
    assert_eq!(report.inflows_by_method.get(&PaymentMethod::Pix), Some(&dec("25.00")));
    assert_eq!(report.outflows_by_category.get("withdrawal"), Some(&dec("20.00")));
}

#[tokio::test]
async fn test_drawer_of_other_tenant_is_not_found() {
    let fixture = Fixture::on(date(2024, 5, 2));
    let service = drawers(&fixture);
    let drawer = service.open(fixture.tenant_id, dec("50.00"), None).await.unwrap();

    let report = service.report(Uuid::new_v4(), drawer.id).await;
    let post = service
        .post_movement(Uuid::new_v4(), drawer.id, sale("1.00", PaymentMethod::Cash))
        .await;

    assert!(matches!(report, Err(BillingError::NotFound(_))));
    assert!(matches!(post, Err(BillingError::NotFound(_))));
}
