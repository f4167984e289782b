//! wsms-cli: operator runner for the water supply billing ledger.
//!
//! Usage:
//!   wsms-cli --db wsms.db --demo --seed 7
//!   wsms-cli --db wsms.db --ipc-mode --as reader --user 12

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::io::{self, BufRead, Write};
use wsms_core::{
    access::{Actor, Role},
    billing::BillStatus,
    config::AppConfig,
    customer::{NewCustomer, NewGroup},
    error::{WsmsError, WsmsResult},
    ledger::ReadingSubmission,
    seed::seed_demo_data,
    service::UtilityService,
    tariff::TariffTier,
    types::{BillId, CustomerId, GroupId, Period, ReadingId, Units},
};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Health,
    Dashboard,
    ListGroups,
    CreateGroup {
        group: NewGroup,
    },
    ListCustomers {
        #[serde(default)]
        group_id: Option<GroupId>,
    },
    GetCustomer {
        customer_id: CustomerId,
    },
    CreateCustomer {
        customer: NewCustomer,
    },
    SubmitReading {
        customer_id: CustomerId,
        period: Period,
        /// Defaults to the customer's latest current reading.
        #[serde(default)]
        previous_reading: Option<Units>,
        current_reading: Units,
    },
    ListReadings {
        #[serde(default)]
        customer_id: Option<CustomerId>,
    },
    SuggestedPreviousReading {
        customer_id: CustomerId,
    },
    CorrectReading {
        reading_id: ReadingId,
        current_reading: Units,
    },
    Quote {
        units: Units,
    },
    ListBills {
        #[serde(default)]
        customer_id: Option<CustomerId>,
    },
    GetBill {
        bill_id: BillId,
    },
    SetBillStatus {
        bill_id: BillId,
        status: BillStatus,
    },
    TariffTiers,
    ReplaceTariff {
        tiers: Vec<TariffTier>,
    },
    RevenueReport,
    UsageReport,
    CustomerSummaryReport,
    CustomerEvents {
        customer_id: CustomerId,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let user_id = parse_arg(&args, "--user", 1i64);
    let demo = args.iter().any(|a| a == "--demo");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let role: Role = flag_value(&args, "--as").unwrap_or("admin").parse()?;
    let actor = Actor::new(user_id, role);

    if !ipc_mode {
        println!("Water Supply Management System: wsms-cli");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  actor:     user {user_id} ({})", role.as_str());
        if demo {
            println!("  seed:      {seed}");
        }
        println!();
    }

    let config = AppConfig::load(data_dir)?;
    let mut service = if db == ":memory:" {
        UtilityService::in_memory(config)?
    } else {
        UtilityService::open(db, config)?
    };

    if demo {
        let summary = seed_demo_data(&mut service, seed)?;
        if !ipc_mode {
            println!(
                "Seeded {} demo customers ({} readings, {} bills paid)",
                summary.customers, summary.readings, summary.bills_paid
            );
            println!();
        }
    }

    if ipc_mode {
        run_ipc_loop(&mut service, &actor)?;
    } else {
        print_summary(&service, &actor)?;
    }

    Ok(())
}

/// One JSON command per stdin line, one JSON response per stdout line.
fn run_ipc_loop(service: &mut UtilityService, actor: &Actor) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<IpcCommand>(&buffer) {
            Ok(IpcCommand::Quit) => break,
            Ok(cmd) => match handle_command(service, actor, cmd) {
                Ok(value) => serde_json::json!({ "ok": value }),
                Err(e) => {
                    if !e.is_user_error() {
                        log::error!("ipc command failed: {e}");
                    }
                    serde_json::json!({ "error": { "kind": e.kind(), "message": e.to_string() } })
                }
            },
            Err(e) => serde_json::json!({ "error": { "kind": "parse", "message": e.to_string() } }),
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(
    service: &mut UtilityService,
    actor: &Actor,
    cmd: IpcCommand,
) -> WsmsResult<serde_json::Value> {
    let value = match cmd {
        IpcCommand::Health => serde_json::to_value(service.health()?)?,
        IpcCommand::Dashboard => serde_json::to_value(service.dashboard_summary(actor)?)?,
        IpcCommand::ListGroups => serde_json::to_value(service.list_groups(actor)?)?,
        IpcCommand::CreateGroup { group } => {
            serde_json::to_value(service.create_group(actor, group)?)?
        }
        IpcCommand::ListCustomers { group_id } => {
            serde_json::to_value(service.list_customers(actor, group_id)?)?
        }
        IpcCommand::GetCustomer { customer_id } => {
            serde_json::to_value(service.get_customer(actor, customer_id)?)?
        }
        IpcCommand::CreateCustomer { customer } => {
            serde_json::to_value(service.create_customer(actor, customer)?)?
        }
        IpcCommand::SubmitReading { customer_id, period, previous_reading, current_reading } => {
            let previous_reading = match previous_reading {
                Some(previous) => previous,
                None => service.suggested_previous_reading(actor, customer_id)?,
            };
            let submission = ReadingSubmission { customer_id, period, previous_reading, current_reading };
            serde_json::to_value(service.submit_reading(actor, submission)?)?
        }
        IpcCommand::ListReadings { customer_id } => {
            serde_json::to_value(service.list_readings(actor, customer_id)?)?
        }
        IpcCommand::SuggestedPreviousReading { customer_id } => {
            serde_json::to_value(service.suggested_previous_reading(actor, customer_id)?)?
        }
        IpcCommand::CorrectReading { reading_id, current_reading } => {
            serde_json::to_value(service.correct_reading(actor, reading_id, current_reading)?)?
        }
        IpcCommand::Quote { units } => serde_json::to_value(service.quote(actor, units)?)?,
        IpcCommand::ListBills { customer_id } => {
            serde_json::to_value(service.list_bills(actor, customer_id)?)?
        }
        IpcCommand::GetBill { bill_id } => serde_json::to_value(service.get_bill(actor, bill_id)?)?,
        IpcCommand::SetBillStatus { bill_id, status } => {
            serde_json::to_value(service.set_bill_status(actor, bill_id, status)?)?
        }
        IpcCommand::TariffTiers => serde_json::to_value(service.tariff_tiers(actor)?)?,
        IpcCommand::ReplaceTariff { tiers } => {
            serde_json::to_value(service.replace_tariff(actor, tiers)?)?
        }
        IpcCommand::RevenueReport => serde_json::to_value(service.revenue_report(actor)?)?,
        IpcCommand::UsageReport => serde_json::to_value(service.usage_report(actor)?)?,
        IpcCommand::CustomerSummaryReport => {
            serde_json::to_value(service.customer_summary_report(actor)?)?
        }
        IpcCommand::CustomerEvents { customer_id } => {
            let entries = service.customer_events(actor, customer_id)?;
            let events = entries
                .iter()
                .map(|entry| entry.decode())
                .collect::<Result<Vec<_>, _>>()?;
            serde_json::to_value(events)?
        }
        IpcCommand::Quit => {
            return Err(WsmsError::Validation("quit is handled by the command loop".into()))
        }
    };
    Ok(value)
}

fn print_summary(service: &UtilityService, actor: &Actor) -> Result<()> {
    let currency = &service.config.settings.currency;
    let health = service.health()?;
    let customers = service.store.customer_count()?;
    let bills = service.store.bills(None)?;
    let pending = service.store.pending_bill_count()?;
    let outstanding: Decimal = bills
        .iter()
        .filter(|b| b.status == BillStatus::Unpaid)
        .map(|b| b.principal())
        .sum();

    println!("=== LEDGER SUMMARY ===");
    println!("  database:       {}", health.database);
    println!("  tariff tiers:   {}", health.tariff_tiers);
    println!("  customers:      {customers}");
    println!("  bills:          {}", bills.len());
    println!("  unpaid bills:   {pending}");
    println!("  outstanding:    {outstanding} {currency}");

    println!();
    println!("=== REVENUE (Last 3 Months) ===");
    match service.revenue_report(actor) {
        Ok(rows) if rows.is_empty() => println!("  (No bills generated yet)"),
        Ok(rows) => {
            for r in rows.iter().take(3) {
                println!(
                    "  {} | Billed: {} | Collected: {} | Outstanding: {}",
                    r.month, r.total_billed, r.total_collected, r.total_outstanding
                );
            }
        }
        Err(e) => println!("  ({e})"),
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
