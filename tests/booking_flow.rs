use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use tokio::net::TcpListener;
use tokio_postgres::{Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use chairtime::tenant::TenantManager;
use chairtime::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("chairtime_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let tm = Arc::new(TenantManager::new(dir, 1000, Duration::from_secs(60)));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let tm = tm.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, tm, "chairtime".to_string(), None).await;
            });
        }
    });

    addr
}

async fn connect(addr: SocketAddr, db: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname(db)
        .user("chairtime")
        .password("chairtime");

    let (client, connection) = config.connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

async fn rows(client: &tokio_postgres::Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|msg| match msg {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn sqlstate(client: &tokio_postgres::Client, sql: &str) -> String {
    let err = client.simple_query(sql).await.err().unwrap();
    err.as_db_error().unwrap().code().code().to_string()
}

/// A Monday at least two days out, so no slot on it is in the past.
fn next_monday() -> NaiveDate {
    let mut date = Local::now().date_naive() + chrono::Duration::days(2);
    while date.weekday() != chrono::Weekday::Mon {
        date += chrono::Duration::days(1);
    }
    date
}

struct Salon {
    staff: Ulid,
    service: Ulid,
}

/// One stylist working Mondays 09:00-17:00 and one 60 minute service.
async fn seed(client: &tokio_postgres::Client) -> Salon {
    let staff = Ulid::new();
    let service = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO staff (id, name) VALUES ('{staff}', 'Mina');
             INSERT INTO services (id, duration_minutes, min_advance_hours, max_advance_days) VALUES ('{service}', 60, 0, 30);
             INSERT INTO staff_services (staff_id, service_id) VALUES ('{staff}', '{service}');
             INSERT INTO staff_schedules (id, staff_id, day_of_week, start_time, end_time) VALUES ('{}', '{staff}', 1, '09:00', '17:00');",
            Ulid::new()
        ))
        .await
        .unwrap();
    Salon { staff, service }
}

fn slot<'a>(slots: &'a [SimpleQueryRow], time: &str) -> &'a SimpleQueryRow {
    slots
        .iter()
        .find(|r| r.get("time") == Some(time))
        .unwrap_or_else(|| panic!("no slot at {time}"))
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn hold_confirm_and_browse() {
    let addr = start_test_server().await;
    let client = connect(addr, "salon").await;
    let salon = seed(&client).await;
    let date = next_monday();

    let slots_sql = format!(
        "SELECT * FROM slots WHERE service_id = '{}' AND date = '{date}'",
        salon.service
    );
    let slots = rows(&client, &slots_sql).await;
    // 09:00 through 16:00 every 30 minutes
    assert_eq!(slots.len(), 15);
    assert_eq!(slots[0].get("time"), Some("09:00"));
    assert_eq!(slots[14].get("time"), Some("16:00"));
    assert!(slots.iter().all(|r| r.get("available") == Some("t")));
    assert_eq!(slots[0].get("staff_name"), Some("Mina"));

    let hold = rows(
        &client,
        &format!(
            "INSERT INTO booking_holds VALUES ('sess-1', '{}', '{}', '{date}', '10:00', 60)",
            salon.staff, salon.service
        ),
    )
    .await;
    assert_eq!(hold.len(), 1);
    let hold_id = hold[0].get("id").unwrap().to_string();
    assert!(hold[0].get("expires_at").is_some());

    // A hold blocks only its own start time.
    let slots = rows(&client, &slots_sql).await;
    assert_eq!(slot(&slots, "09:30").get("available"), Some("t"));
    assert_eq!(slot(&slots, "10:00").get("available"), Some("f"));
    assert_eq!(slot(&slots, "10:30").get("available"), Some("t"));

    let booking = rows(
        &client,
        &format!(
            "INSERT INTO bookings VALUES ('{hold_id}', 'Ada', 'Lovelace', 'ada@example.com', '555-0100', NULL)"
        ),
    )
    .await;
    assert_eq!(booking.len(), 1);
    assert!(booking[0].get("id").unwrap().parse::<Ulid>().is_ok());

    // A booking blocks every slot it overlaps.
    let slots = rows(&client, &slots_sql).await;
    assert_eq!(slot(&slots, "09:00").get("available"), Some("t"));
    assert_eq!(slot(&slots, "09:30").get("available"), Some("f"));
    assert_eq!(slot(&slots, "10:00").get("available"), Some("f"));
    assert_eq!(slot(&slots, "10:30").get("available"), Some("f"));
    assert_eq!(slot(&slots, "11:00").get("available"), Some("t"));

    // The booking now blocks the slot; the hold is gone.
    let code = sqlstate(
        &client,
        &format!(
            "INSERT INTO booking_holds VALUES ('sess-2', '{}', '{}', '{date}', '10:30', 60)",
            salon.staff, salon.service
        ),
    )
    .await;
    assert_eq!(code, "23P01");
    let code = sqlstate(
        &client,
        &format!("INSERT INTO bookings VALUES ('{hold_id}', 'Ada', 'Lovelace', 'ada@example.com', '555')"),
    )
    .await;
    assert_eq!(code, "P0002");

    let calendar = rows(
        &client,
        &format!(
            "SELECT * FROM calendar WHERE date >= '{}' AND date <= '{date}'",
            date - chrono::Duration::days(1)
        ),
    )
    .await;
    assert_eq!(calendar.len(), 2);
    assert_eq!(calendar[0].get("available"), Some("f"));
    assert_eq!(calendar[1].get("date"), Some(date.to_string().as_str()));
    assert_eq!(calendar[1].get("available"), Some("t"));
}

#[tokio::test]
async fn released_hold_frees_slot() {
    let addr = start_test_server().await;
    let client = connect(addr, "salon").await;
    let salon = seed(&client).await;
    let date = next_monday();

    let hold = rows(
        &client,
        &format!(
            "INSERT INTO booking_holds VALUES ('sess-1', '{}', '{}', '{date}', '14:00', 60)",
            salon.staff, salon.service
        ),
    )
    .await;
    let hold_id = hold[0].get("id").unwrap().to_string();

    let msgs = client
        .simple_query(&format!("DELETE FROM booking_holds WHERE id = '{hold_id}'"))
        .await
        .unwrap();
    assert!(msgs
        .iter()
        .any(|m| matches!(m, SimpleQueryMessage::CommandComplete(1))));

    let slots = rows(
        &client,
        &format!(
            "SELECT * FROM slots WHERE service_id = '{}' AND date = '{date}' AND staff_id = '{}'",
            salon.service, salon.staff
        ),
    )
    .await;
    assert_eq!(slot(&slots, "14:00").get("available"), Some("t"));
}

#[tokio::test]
async fn errors_carry_sqlstate() {
    let addr = start_test_server().await;
    let client = connect(addr, "salon").await;
    let salon = seed(&client).await;

    assert_eq!(sqlstate(&client, "SELECT * FROM nowhere").await, "42601");
    assert_eq!(
        sqlstate(
            &client,
            &format!(
                "SELECT * FROM slots WHERE service_id = '{}' AND date = '{}'",
                Ulid::new(),
                next_monday()
            )
        )
        .await,
        "P0002"
    );
    let hold = rows(
        &client,
        &format!(
            "INSERT INTO booking_holds VALUES ('s', '{}', '{}', '{}', '10:00', 60)",
            salon.staff,
            salon.service,
            next_monday()
        ),
    )
    .await;
    let hold_id = hold[0].get("id").unwrap().to_string();
    assert_eq!(
        sqlstate(
            &client,
            &format!("INSERT INTO bookings VALUES ('{hold_id}', 'Ada', 'Lovelace', 'no-at-sign', '555')")
        )
        .await,
        "22023"
    );
    assert_eq!(
        sqlstate(
            &client,
            &format!("INSERT INTO bookings VALUES ('{}', 'Ada', 'Lovelace', 'ada@example.com', '555')", Ulid::new())
        )
        .await,
        "P0002"
    );
}

#[tokio::test]
async fn tenants_do_not_share_data() {
    let addr = start_test_server().await;
    let a = connect(addr, "salon_a").await;
    let b = connect(addr, "salon_b").await;
    let salon = seed(&a).await;

    let sql = format!(
        "SELECT * FROM slots WHERE service_id = '{}' AND date = '{}'",
        salon.service,
        next_monday()
    );
    assert_eq!(rows(&a, &sql).await.len(), 15);
    assert_eq!(sqlstate(&b, &sql).await, "P0002");
}

#[tokio::test]
async fn extended_protocol_binds_parameters() {
    let addr = start_test_server().await;
    let client = connect(addr, "salon").await;
    let salon = seed(&client).await;

    let service = salon.service.to_string();
    let date = next_monday().to_string();
    let rows = client
        .query(
            "SELECT * FROM slots WHERE service_id = $1 AND date = $2",
            &[&service, &date],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 15);
    let first: String = rows[0].get("time");
    assert_eq!(first, "09:00");
}
