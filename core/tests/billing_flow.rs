use rust_decimal::Decimal;
use wsms_core::{
    access::{Actor, Role},
    billing::BillStatus,
    customer::NewCustomer,
    error::WsmsError,
    ledger::{BillReceipt, ReadingSubmission},
    service::UtilityService,
    types::{CustomerId, MAX_STORED_UNITS},
};

fn admin() -> Actor {
    Actor::new(1, Role::Admin)
}

fn money(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn register(service: &mut UtilityService, code: &str) -> CustomerId {
    service
        .create_customer(
            &admin(),
            NewCustomer {
                customer_code:  code.into(),
                account_number: None,
                full_name:      format!("Customer {code}"),
                address:        "1 Reservoir Road".into(),
                phone:          None,
                meter_number:   format!("MTR-{code}"),
                group_id:       None,
                new_group:      None,
            },
        )
        .unwrap()
        .id
}

fn submit(
    service: &mut UtilityService,
    customer_id: CustomerId,
    period: &str,
    previous: u64,
    current: u64,
) -> Result<BillReceipt, WsmsError> {
    service.submit_reading(
        &admin(),
        ReadingSubmission {
            customer_id,
            period: period.parse().unwrap(),
            previous_reading: previous,
            current_reading: current,
        },
    )
}

#[test]
fn first_bill_has_no_arrears() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");

    // 10 units at 1.00 + 40 units at 2.00
    let receipt = submit(&mut service, customer, "2024-03", 100, 150).unwrap();

    assert_eq!(receipt.reading.units_consumed, 50);
    assert_eq!(receipt.reading.created_by, Some(1));
    assert_eq!(receipt.bill.units, 50);
    assert_eq!(receipt.bill.current_charge, money("90.00"));
    assert_eq!(receipt.bill.arrears, Decimal::ZERO);
    assert!(receipt.bill.arrears_breakdown.is_empty());
    assert_eq!(receipt.bill.total_amount, money("90.00"));
    assert_eq!(receipt.bill.status, BillStatus::Unpaid);
    assert_eq!(receipt.bill.reading_id, receipt.reading.id);
    assert_eq!(receipt.bill.current_reading, Some(150));
    assert_eq!(receipt.bill.customer_name.as_deref(), Some("Customer C001"));
}

#[test]
fn arrears_carry_principal_without_compounding() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");

    let jan = submit(&mut service, customer, "2024-01", 0, 10).unwrap();
    assert_eq!(jan.bill.total_amount, money("10.00"));

    let feb = submit(&mut service, customer, "2024-02", 10, 20).unwrap();
    assert_eq!(feb.bill.current_charge, money("10.00"));
    assert_eq!(feb.bill.arrears, money("10.00"));
    assert_eq!(feb.bill.total_amount, money("20.00"));

    // Feb's total already includes Jan; only Feb's principal is carried.
    let mar = submit(&mut service, customer, "2024-03", 20, 25).unwrap();
    assert_eq!(mar.bill.current_charge, money("5.00"));
    assert_eq!(mar.bill.arrears, money("20.00"));
    assert_eq!(mar.bill.total_amount, money("25.00"));

    let periods: Vec<String> = mar
        .bill
        .arrears_breakdown
        .iter()
        .map(|line| line.period.to_string())
        .collect();
    assert_eq!(periods, vec!["2024-01", "2024-02"]);
    assert!(mar.bill.arrears_breakdown.iter().all(|l| l.amount == money("10.00")));
}

#[test]
fn paid_bills_drop_out_of_arrears() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");

    let jan = submit(&mut service, customer, "2024-01", 0, 10).unwrap();
    service
        .set_bill_status(&admin(), jan.bill.id, BillStatus::Paid)
        .unwrap();

    let feb = submit(&mut service, customer, "2024-02", 10, 12).unwrap();
    assert_eq!(feb.bill.arrears, Decimal::ZERO);
    assert_eq!(feb.bill.total_amount, money("2.00"));
}

#[test]
fn arrears_are_per_customer() {
    let mut service = UtilityService::build_test().unwrap();
    let a = register(&mut service, "A");
    let b = register(&mut service, "B");

    submit(&mut service, a, "2024-01", 0, 10).unwrap();
    let b_bill = submit(&mut service, b, "2024-02", 0, 5).unwrap();
    assert_eq!(b_bill.bill.arrears, Decimal::ZERO);
}

#[test]
fn zero_consumption_bills_only_arrears() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");

    submit(&mut service, customer, "2024-01", 0, 10).unwrap();
    let feb = submit(&mut service, customer, "2024-02", 10, 10).unwrap();

    assert_eq!(feb.bill.units, 0);
    assert_eq!(feb.bill.current_charge, Decimal::ZERO);
    assert_eq!(feb.bill.total_amount, money("10.00"));
}

#[test]
fn backwards_meter_is_rejected_and_nothing_is_written() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");

    let err = submit(&mut service, customer, "2024-01", 150, 100).unwrap_err();
    assert!(matches!(err, WsmsError::InvalidReading { previous: 150, current: 100 }));

    assert!(service.store.readings(None).unwrap().is_empty());
    assert!(service.store.bills(None).unwrap().is_empty());
}

#[test]
fn reading_too_large_to_store_is_rejected_and_nothing_is_written() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");

    let err = submit(&mut service, customer, "2024-01", 0, MAX_STORED_UNITS + 5).unwrap_err();
    assert!(matches!(err, WsmsError::Validation(_)));

    assert!(service.store.readings(None).unwrap().is_empty());
    assert!(service.store.bills(None).unwrap().is_empty());
    assert!(service.store.events_of_type("bill_generated").unwrap().is_empty());
}

#[test]
fn second_reading_in_a_period_conflicts() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");

    submit(&mut service, customer, "2024-01", 0, 10).unwrap();
    let err = submit(&mut service, customer, "2024-01-20", 10, 30).unwrap_err();

    assert!(matches!(err, WsmsError::Conflict(_)));
    assert_eq!(service.store.readings(Some(customer)).unwrap().len(), 1);
    assert_eq!(service.store.bills(Some(customer)).unwrap().len(), 1);
}

#[test]
fn unknown_customer_is_not_found() {
    let mut service = UtilityService::build_test().unwrap();
    let err = submit(&mut service, 999, "2024-01", 0, 10).unwrap_err();
    assert!(matches!(err, WsmsError::NotFound { entity: "customer", id: 999 }));
}

#[test]
fn bill_generation_is_logged() {
    let mut service = UtilityService::build_test().unwrap();
    let customer = register(&mut service, "C001");
    let receipt = submit(&mut service, customer, "2024-01", 0, 10).unwrap();

    let events = service.customer_events(&admin(), customer).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "bill_generated");
    let payload: serde_json::Value = serde_json::from_str(&events[0].payload).unwrap();
    assert_eq!(payload["bill_id"], receipt.bill.id);
    assert_eq!(payload["period"], "2024-01");
}
