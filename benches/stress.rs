use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime, TimeDelta};

use chairside::auth::Identity;
use chairside::config::Settings;
use chairside::engine::Engine;
use chairside::tenant::TenantManager;

/// Slots per bench day: 00:00–22:30 on a 15-minute grid.
const SLOTS_PER_DAY: i64 = 90;

fn bench_settings() -> Settings {
    let dir = std::env::temp_dir().join(format!("chairside_bench_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    Settings {
        data_dir: dir,
        ..Settings::default()
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
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

/// The i-th slot on a calendar that opens 2031-01-01.
fn slot(i: i64) -> chrono::NaiveDateTime {
    let date = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap() + TimeDelta::days(i / SLOTS_PER_DAY);
    date.and_time(NaiveTime::MIN) + TimeDelta::minutes(15 * (i % SLOTS_PER_DAY))
}

async fn open_provider(shop: &Engine, id: &str) -> Identity {
    let provider = Identity::provider(id);
    shop.upsert_schedule(
        &provider,
        vec![0, 1, 2, 3, 4, 5, 6],
        NaiveTime::MIN,
        NaiveTime::from_hms_opt(22, 30, 0).unwrap(),
    )
    .await
    .expect("schedule");
    provider
}

async fn phase1_sequential(shop: &Engine) {
    let barber = open_provider(shop, "seq@bench").await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        shop.book_as_provider(&barber, "client@bench", slot(i as i64), "shape_up")
            .await
            .expect("booking");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(shop: &Arc<Engine>) {
    let n_tasks = 10;
    let n_per_task = 200i64;

    // One provider per task, so tasks contend on the WAL writer, not the lock
    for i in 0..n_tasks {
        open_provider(shop, &format!("conc{i}@bench")).await;
    }

    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..n_tasks {
        let shop = Arc::clone(shop);
        handles.push(tokio::spawn(async move {
            let client = Identity::client(format!("client{i}@bench"));
            let provider_id = format!("conc{i}@bench");
            for j in 0..n_per_task {
                shop.book_as_client(&client, &provider_id, slot(j), "shape_up")
                    .await
                    .expect("booking");
            }
        }));
    }
    for h in handles {
        h.await.expect("task");
    }

    let elapsed = start.elapsed();
    let total = n_tasks as i64 * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(shop: &Arc<Engine>) {
    let barber = open_provider(shop, "read@bench").await;
    for i in 0..200 {
        shop.book_as_provider(&barber, "client@bench", slot(i), "shape_up")
            .await
            .expect("booking");
    }

    // Writers keep appending in the background on their own calendars
    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..5 {
        let provider = open_provider(shop, &format!("writer{w}@bench")).await;
        let shop = Arc::clone(shop);
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let mut i = 0i64;
            while !stop.load(Ordering::Relaxed) {
                let _ = shop
                    .book_as_provider(&provider, "client@bench", slot(i), "shape_up")
                    .await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let read_date = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
    let mut reader_handles = Vec::new();
    for _ in 0..n_readers {
        let shop = Arc::clone(shop);
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                shop.availability("read@bench", read_date)
                    .await
                    .expect("availability");
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.expect("reader"));
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
}

async fn phase4_tenant_storm(manager: &Arc<TenantManager>) {
    let n_tenants = 50;
    let ops_per_tenant = 10i64;

    let start = Instant::now();
    let success = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for i in 0..n_tenants {
        let manager = Arc::clone(manager);
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let shop = manager
                .get_or_create(&format!("storm{i}"))
                .expect("tenant");
            let barber = open_provider(&shop, "barber@bench").await;
            for j in 0..ops_per_tenant {
                shop.book_as_provider(&barber, "client@bench", slot(j), "shape_up")
                    .await
                    .expect("booking");
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
        "  {n_tenants} tenants, {ops_per_tenant} ops each: {ok}/{n_tenants} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    chairside::observability::init_tracing();

    let settings = bench_settings();
    println!("=== chairside stress benchmark ===");
    println!("data dir: {}\n", settings.data_dir.display());

    let manager = Arc::new(TenantManager::new(&settings));

    println!("[phase 1] sequential write throughput");
    let shop = manager.get_or_create("phase1").expect("tenant");
    phase1_sequential(&shop).await;

    println!("\n[phase 2] concurrent write throughput");
    let shop = manager.get_or_create("phase2").expect("tenant");
    phase2_concurrent(&shop).await;

    println!("\n[phase 3] read latency under write load");
    let shop = manager.get_or_create("phase3").expect("tenant");
    phase3_read_under_load(&shop).await;

    println!("\n[phase 4] tenant storm");
    phase4_tenant_storm(&manager).await;

    println!("\n=== benchmark complete ===");
}
