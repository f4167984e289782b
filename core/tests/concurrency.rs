use rust_decimal::Decimal;
use std::path::PathBuf;
use std::thread;
use wsms_core::{
    access::{Actor, Role},
    config::AppConfig,
    customer::NewCustomer,
    error::WsmsError,
    ledger::ReadingSubmission,
    service::UtilityService,
    store::LedgerStore,
    types::CustomerId,
};

fn admin() -> Actor {
    Actor::new(1, Role::Admin)
}

struct TempDb(PathBuf);

impl TempDb {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("wsms_{name}_{}.db", std::process::id()));
        let db = TempDb(path);
        db.cleanup();
        db
    }

    fn path(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }

    fn cleanup(&self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path()));
        }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// A file-backed ledger with one customer and an unpaid January bill of 10.00.
fn prepared(db: &TempDb) -> (UtilityService, CustomerId) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut service = UtilityService::open(&db.path(), AppConfig::default_test()).unwrap();
    let customer = service
        .create_customer(
            &admin(),
            NewCustomer {
                customer_code:  "C001".into(),
                account_number: None,
                full_name:      "Wei Chen".into(),
                address:        String::new(),
                phone:          None,
                meter_number:   "MTR-001".into(),
                group_id:       None,
                new_group:      None,
            },
        )
        .unwrap();
    service
        .submit_reading(
            &admin(),
            ReadingSubmission {
                customer_id:      customer.id,
                period:           "2024-01".parse().unwrap(),
                previous_reading: 0,
                current_reading:  10,
            },
        )
        .unwrap();
    (service, customer.id)
}

/// Bill on a second connection to the same file, from its own thread.
fn submit_from_thread(
    store: LedgerStore,
    customer_id: CustomerId,
    period: &'static str,
    previous: u64,
    current: u64,
) -> thread::JoinHandle<Result<Decimal, WsmsError>> {
    thread::spawn(move || {
        let mut service = UtilityService::with_store(store, AppConfig::default_test())?;
        let receipt = service.submit_reading(
            &admin(),
            ReadingSubmission {
                customer_id,
                period: period.parse()?,
                previous_reading: previous,
                current_reading: current,
            },
        )?;
        Ok(receipt.bill.arrears)
    })
}

#[test]
fn concurrent_bills_see_serial_arrears_snapshots() {
    let db = TempDb::new("serial_arrears");
    let (base, customer) = prepared(&db);

    let feb = submit_from_thread(base.store.reopen().unwrap(), customer, "2024-02", 10, 20);
    let mar = submit_from_thread(base.store.reopen().unwrap(), customer, "2024-03", 20, 30);

    let mut arrears = vec![feb.join().unwrap().unwrap(), mar.join().unwrap().unwrap()];
    arrears.sort();

    // Whichever commits second carries the other's 10.00 principal.
    let ten: Decimal = "10.00".parse().unwrap();
    assert_eq!(arrears, vec![ten, ten + ten]);
}

#[test]
fn concurrent_readings_for_one_period_bill_once() {
    let db = TempDb::new("same_period");
    let (base, customer) = prepared(&db);

    let first = submit_from_thread(base.store.reopen().unwrap(), customer, "2024-02", 10, 20);
    let second = submit_from_thread(base.store.reopen().unwrap(), customer, "2024-02", 10, 25);
    let results = [first.join().unwrap(), second.join().unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(WsmsError::Conflict(_)))));

    assert_eq!(base.store.bills(Some(customer)).unwrap().len(), 2);
}

#[test]
fn reopened_in_memory_store_is_isolated() {
    let base = UtilityService::build_test().unwrap();
    let mut other = base.store.reopen().unwrap();
    other.migrate().unwrap();
    assert!(other.seed_default_tariff(&[]).unwrap());
    assert_eq!(base.tariff_tiers(&admin()).unwrap().len(), 2);
}
