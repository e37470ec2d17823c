use approx::assert_relative_eq;
use lmt_aggregate::*;

const HEADER: &str = "data_collection_time,endpoints_all,endpoints_disconnected,instances_all,lmt_database_type,endpoints_os_linux,endpoints_os_windows,endpoints_os_ibm_aix,endpoints_os_solaris_sparc";

fn dataset(rows: &[String]) -> Dataset {
    let mut csv = String::from(HEADER);
    for row in rows {
        csv.push('\n');
        csv.push_str(row);
    }
    Dataset::from_reader(csv.as_bytes()).unwrap()
}

/// Two years of snapshots with uneven record counts per month and a few
/// months where nothing is connected at all
fn varied() -> Dataset {
    let types = ["db2", "mssql", "oracle"];
    let mut rows = vec![];
    let mut x: u64 = 7;
    for i in 0..60u64 {
        x = (x * 1_103_515_245 + 12_345) % 2_147_483_648;
        let month = 1 + (x % 12);
        let year = 2022 + (i % 2);
        let total = if i % 13 == 0 { 0 } else { x % 5_000 };
        let disconnected = if total == 0 { 0 } else { x % (total + 1) };
        rows.push(format!(
            "{}-{:02}-{:02} 08:00:00,{},{},{},{},{},{},{},{}",
            year,
            month,
            1 + i % 28,
            total,
            disconnected,
            x % 20_000,
            types[(x % 3) as usize],
            x % 7,
            x % 11,
            x % 3,
            i % 2,
        ));
    }
    dataset(&rows)
}

#[test]
fn bucketing_preserves_totals() {
    let ds = varied();
    let all: u64 = ds.records().iter().map(|r| r.endpoints_all).sum();
    for g in [Granularity::Monthly, Granularity::Quarterly] {
        let rows = connectivity_over_time(&ds, g);
        let disconnected: u64 = rows.iter().map(|r| r.disconnected_endpoints).sum();
        let connected: u64 = rows.iter().map(|r| r.connected_endpoints()).sum();
        assert_eq!(disconnected + connected, all);
        assert!(rows.windows(2).all(|w| w[0].bucket < w[1].bucket));
    }
}

#[test]
fn ratios_are_complementary() {
    for row in connectivity_over_time(&varied(), Granularity::Monthly) {
        if row.total_endpoints > 0 {
            let sum = row.connected_ratio.value().unwrap() + row.disconnected_ratio.value().unwrap();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        } else {
            assert!(!row.disconnected_ratio.is_defined());
        }
    }
}

#[test]
fn database_shares_sum_to_one() {
    for g in [Granularity::Monthly, Granularity::Quarterly] {
        for row in database_type_distribution(&varied(), g) {
            assert!(row.total() > 0);
            let sum: f64 = row.shares().values().map(|x| x.value().unwrap()).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn os_breakdown_sorted_and_idempotent() {
    let ds = varied();
    let first = os_breakdown(&ds);
    assert!(first.windows(2).all(|w| w[0].value >= w[1].value));
    assert_eq!(first, os_breakdown(&ds));

    let avgs = os_breakdown_average(&ds);
    assert!(avgs.windows(2).all(|w| w[0].value >= w[1].value));
    assert_eq!(avgs, os_breakdown_average(&ds));
}

#[test]
fn label_normalization() {
    assert_eq!(os_label("endpoints_os_ibm_aix"), "IBM aix");
    assert_eq!(os_label("endpoints_os_solaris_sparc"), "Solaris Sparc");
}

#[test]
fn two_months_of_connectivity() {
    let ds = dataset(&[
        "2023-01-10 00:00:00,100,10,0,db2,0,0,0,0".to_string(),
        "2023-02-10 00:00:00,200,100,0,db2,0,0,0,0".to_string(),
    ]);
    let rows = connectivity_over_time(&ds, Granularity::Monthly);
    assert_eq!(rows.len(), 2);
    assert_relative_eq!(rows[0].disconnected_ratio.value().unwrap(), 0.10);
    assert_relative_eq!(rows[1].disconnected_ratio.value().unwrap(), 0.50);
}

#[test]
fn instances_per_endpoint() {
    let ds = dataset(&[
        "2023-01-10 00:00:00,100,0,100,db2,0,0,0,0".to_string(),
        "2023-02-10 00:00:00,50,0,200,db2,0,0,0,0".to_string(),
    ]);
    assert_eq!(avg_instances_per_endpoint(&ds).value(), Some(2.0));
}
