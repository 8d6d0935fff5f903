use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tokio_postgres::{Config, NoTls, SimpleQueryMessage};
use ulid::Ulid;

/// Bookable hours per day: 09:00 through 16:00 for a 60 minute service.
const HOURS_PER_DAY: usize = 8;

async fn connect(host: &str, port: u16, db: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(db)
        .user("chairtime")
        .password("chairtime");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn fresh_tenant() -> String {
    format!("bench_{}", Ulid::new()).to_lowercase()
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

#[derive(Clone, Copy)]
struct Salon {
    staff: Ulid,
    service: Ulid,
}

/// One stylist working 09:00-17:00 every day, one 60 minute service.
async fn setup(client: &tokio_postgres::Client) -> Salon {
    let staff = Ulid::new();
    let service = Ulid::new();
    let mut sql = format!(
        "INSERT INTO staff (id, name) VALUES ('{staff}', 'Bench');
         INSERT INTO services VALUES ('{service}', 60, 0, 365, 0, 0);
         INSERT INTO staff_services (staff_id, service_id) VALUES ('{staff}', '{service}');"
    );
    for day in 0..7 {
        sql.push_str(&format!(
            "INSERT INTO staff_schedules VALUES ('{}', '{staff}', {day}, '09:00', '17:00');",
            Ulid::new()
        ));
    }
    client.batch_execute(&sql).await.unwrap();
    Salon { staff, service }
}

/// The n-th bookable (date, time) pair, starting two days out.
fn nth_slot(n: usize) -> (NaiveDate, String) {
    let first = Local::now().date_naive() + chrono::Duration::days(2);
    let date = first + chrono::Duration::days((n / HOURS_PER_DAY) as i64);
    let hour = 9 + n % HOURS_PER_DAY;
    (date, format!("{hour:02}:00"))
}

async fn hold(
    client: &tokio_postgres::Client,
    salon: Salon,
    session: &str,
    n: usize,
) -> Result<String, tokio_postgres::Error> {
    let (date, time) = nth_slot(n);
    let msgs = client
        .simple_query(&format!(
            "INSERT INTO booking_holds VALUES ('{session}', '{}', '{}', '{date}', '{time}', 60)",
            salon.staff, salon.service
        ))
        .await?;
    Ok(msgs
        .into_iter()
        .find_map(|m| match m {
            SimpleQueryMessage::Row(row) => row.get("id").map(str::to_string),
            _ => None,
        })
        .unwrap_or_default())
}

async fn confirm(client: &tokio_postgres::Client, hold_id: &str) -> Result<(), tokio_postgres::Error> {
    client
        .batch_execute(&format!(
            "INSERT INTO bookings VALUES ('{hold_id}', 'Ada', 'Lovelace', 'ada@example.com', '555')"
        ))
        .await
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port, &fresh_tenant()).await;
    let salon = setup(&client).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        let hold_id = hold(&client, salon, "seq", i).await.unwrap();
        confirm(&client, &hold_id).await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} hold+confirm in {:.2}s = {ops:.0} bookings/sec", elapsed.as_secs_f64());
    print_latency("hold+confirm latency", &mut latencies);
}

/// Many sessions race for the same slots; each slot must end up booked once.
async fn phase2_contention(host: &str, port: u16) {
    let tenant = fresh_tenant();
    let setup_client = connect(host, port, &tenant).await;
    let salon = setup(&setup_client).await;

    let n_tasks = 20;
    let n_slots = 200;
    let booked = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for task in 0..n_tasks {
        let host = host.to_string();
        let tenant = tenant.clone();
        let booked = booked.clone();
        let conflicts = conflicts.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &tenant).await;
            let session = format!("racer-{task}");
            for slot in 0..n_slots {
                match hold(&client, salon, &session, slot).await {
                    Ok(hold_id) => match confirm(&client, &hold_id).await {
                        Ok(()) => {
                            booked.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            conflicts.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    Err(_) => {
                        conflicts.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let booked = booked.load(Ordering::Relaxed);
    let conflicts = conflicts.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} sessions x {n_slots} slots in {:.2}s: {booked} booked, {conflicts} rejected",
        elapsed.as_secs_f64()
    );
    assert_eq!(booked, n_slots, "every slot booked exactly once");
}

async fn phase3_read_under_load(host: &str, port: u16) {
    let tenant = fresh_tenant();
    let setup_client = connect(host, port, &tenant).await;
    let salon = setup(&setup_client).await;
    // Book about half of the first week
    for i in (0..HOURS_PER_DAY * 7).step_by(2) {
        let hold_id = hold(&setup_client, salon, "prefill", i).await.unwrap();
        confirm(&setup_client, &hold_id).await.unwrap();
    }
    drop(setup_client);

    // Writers keep booking further out in the same tenant
    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..5 {
        let host = host.to_string();
        let tenant = tenant.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &tenant).await;
            let session = format!("writer-{w}");
            let mut i = HOURS_PER_DAY * 30 + w;
            while !stop.load(Ordering::Relaxed) && i < HOURS_PER_DAY * 360 {
                if let Ok(hold_id) = hold(&client, salon, &session, i).await {
                    let _ = confirm(&client, &hold_id).await;
                }
                i += 5;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();
    for r in 0..n_readers {
        let host = host.to_string();
        let tenant = tenant.clone();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &tenant).await;
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for k in 0..reads_per_reader {
                let (date, _) = nth_slot(((r + k) % 7) * HOURS_PER_DAY);
                let t = Instant::now();
                client
                    .simple_query(&format!(
                        "SELECT * FROM slots WHERE service_id = '{}' AND date = '{date}'",
                        salon.service
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("slot query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = Arc::new(AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &fresh_tenant()).await;
            let salon = setup(&client).await;
            for i in 0..ops_per_conn {
                let hold_id = hold(&client, salon, "storm", i).await.unwrap();
                confirm(&client, &hold_id).await.unwrap();
            }
            success.fetch_add(1, Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} bookings each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("CHAIRTIME_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("CHAIRTIME_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid CHAIRTIME_PORT");

    println!("=== chairtime stress benchmark ===");
    println!("target: {host}:{port}\n");

    // Each phase uses its own tenant to avoid interference

    println!("[phase 1] sequential hold+confirm throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] contended holds on shared slots");
    phase2_contention(&host, port).await;

    println!("\n[phase 3] slot query latency under booking load");
    phase3_read_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== done ===");
}
