/*! Derived views over LMT infrastructure-monitoring snapshots.

A [`Dataset`] is a table of periodic snapshots: endpoint counts, the number
of disconnected endpoints, software instance counts, the database type, and
one `endpoints_os_*` column per tracked operating system.  The functions in
this crate are pure: they take a dataset (and maybe a [`Granularity`]) and
return a freshly computed view.

## Example

```
# use lmt_aggregate::*;
let csv = "\
data_collection_time,endpoints_all,endpoints_disconnected,instances_all,lmt_database_type,endpoints_os_ibm_aix
2023-01-15 10:00:00,100,10,250,db2,100
2023-02-15 10:00:00,200,100,50,mssql,200
";
let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();

let rows = connectivity_over_time(&dataset, Granularity::Monthly);
assert_eq!(format!("{} {:.2}", rows[0].bucket, rows[0].disconnected_ratio), "2023-01 0.10");
assert_eq!(format!("{} {:.2}", rows[1].bucket, rows[1].disconnected_ratio), "2023-02 0.50");

assert_eq!(avg_instances_per_endpoint(&dataset).value(), Some(1.0));
assert_eq!(os_breakdown(&dataset)[0].label, "IBM aix");
```

Division by zero never panics and never produces `NaN`: it produces
[`Ratio::UNDEFINED`].
*/

mod bucket;
mod dataset;
mod os;
mod ratio;
mod views;

pub use bucket::*;
pub use dataset::*;
pub use os::*;
pub use ratio::*;
pub use views::*;
