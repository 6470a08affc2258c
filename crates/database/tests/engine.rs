//! End-to-end scenarios over the full engine surface.

use std::collections::HashSet;
use std::path::Path;
use strata_database::{
    Condition, Config, Database, Mode, Row, TableBuilder, TableSchema, Value, ValueType,
};
use tempfile::tempdir;

fn orders_schema() -> TableSchema {
    TableBuilder::new("orders")
        .unwrap()
        .add_column("id", ValueType::Number)
        .unwrap()
        .add_column("customer", ValueType::Text)
        .unwrap()
        .add_column("amount", ValueType::Number)
        .unwrap()
        .add_column("day", ValueType::Date)
        .unwrap()
        .add_column("discount", ValueType::Number)
        .unwrap()
        .build()
        .unwrap()
}

fn order(id: i64, customer: &str, amount: i64, day: (i32, u32, u32), discount: i64) -> Row {
    let mut row = Row::new("orders");
    row.set("id", Value::number(id))
        .set("customer", Value::Text(customer.into()))
        .set("amount", Value::number(amount))
        .set("day", Value::date(day.0, day.1, day.2))
        .set("discount", Value::number(discount));
    row
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn open_db(root: &Path) -> Database {
    init_tracing();
    Database::open(Config::builder().root(root).build()).unwrap()
}

fn seeded(root: &Path) -> Database {
    let db = open_db(root);
    db.create_table_with(orders_schema(), 2).unwrap();
    let mut first = vec![
        order(1, "Alice", 10, (2024, 1, 1), 0),
        order(2, "Bob", 20, (2024, 2, 1), 1),
        order(3, "Alice", 30, (2024, 3, 1), 1),
    ];
    let mut second = vec![
        order(4, "Carol", 40, (2024, 4, 1), 0),
        order(5, "Bob", 50, (2024, 5, 1), 1),
    ];
    db.insert("orders", "p0", &mut first).unwrap();
    db.insert("orders", "p1", &mut second).unwrap();
    db
}

fn ids(rows: &[Row]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows
        .iter()
        .map(|r| r.get("id").unwrap().to_field().parse().unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

#[test]
fn test_round_trip_preserves_values() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());

    let found = db
        .select("orders", &Condition::equals("id", Value::number(3)), None, 0)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("customer"), Some(&Value::Text("Alice".into())));
    assert_eq!(found[0].get("amount"), Some(&Value::number(30)));
    assert_eq!(found[0].get("day"), Some(&Value::date(2024, 3, 1)));
}

/// Every whitespaced byte range in the partition file appears exactly once
/// in the free-list, and vice versa.
#[test]
fn test_free_list_matches_whitespace_ranges() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());

    let victims = db
        .select("orders", &Condition::equals("customer", "Bob"), None, 0)
        .unwrap();
    assert_eq!(ids(&victims), vec![2, 5]);
    db.delete("orders", &victims).unwrap();

    let table = db.table("orders").unwrap();
    for partition in table.partitions() {
        let content = std::fs::read_to_string(table.partition_path(partition)).unwrap();
        let mut blanks = HashSet::new();
        let mut offset = 0u64;
        for (i, line) in content.split_inclusive('\n').enumerate() {
            if i > 0 && line.trim_end_matches('\n').chars().all(|c| c == ' ')
                && !line.trim_end_matches('\n').is_empty()
            {
                blanks.insert((offset, line.len() as u32));
            }
            offset += line.len() as u64;
        }

        let (package, _) = strata_storage::empties::EmptiesPackage::load(
            &table.empties_path(partition),
            partition,
        )
        .unwrap();
        let listed: HashSet<(u64, u32)> = package
            .routes()
            .map(|r| (r.offset(), r.length()))
            .collect();
        assert_eq!(listed.len(), package.len());
        assert_eq!(blanks, listed, "partition {partition}");
    }
}

#[test]
fn test_insert_rollback_is_idempotent() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());
    let table = db.table("orders").unwrap();
    let file_before = std::fs::read(table.partition_path("p0")).unwrap();
    let empties_before = std::fs::read(table.empties_path("p0")).unwrap();

    let mut rows = vec![order(6, "Dora", 60, (2024, 6, 1), 0)];
    db.insert("orders", "p0", &mut rows).unwrap();
    db.rollback("orders", "p0").unwrap();

    assert_eq!(std::fs::read(table.partition_path("p0")).unwrap(), file_before);
    assert_eq!(std::fs::read(table.empties_path("p0")).unwrap(), empties_before);

    // the log is gone, a second rollback is a no-op
    db.rollback("orders", "p0").unwrap();
    assert_eq!(std::fs::read(table.partition_path("p0")).unwrap(), file_before);
    assert_eq!(
        db.select("orders", &Condition::All, None, 0).unwrap().len(),
        5
    );
}

#[test]
fn test_delete_rollback_is_idempotent() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());
    let table = db.table("orders").unwrap();
    let file_before = std::fs::read(table.partition_path("p0")).unwrap();

    let victims = db
        .select("orders", &Condition::equals("customer", "Alice"), None, 0)
        .unwrap();
    db.delete("orders", &victims).unwrap();
    db.rollback("orders", "p0").unwrap();
    db.rollback("orders", "p0").unwrap();

    assert_eq!(std::fs::read(table.partition_path("p0")).unwrap(), file_before);
    assert_eq!(
        ids(&db
            .select("orders", &Condition::equals("customer", "Alice"), None, 0)
            .unwrap()),
        vec![1, 3]
    );
}

/// Index-driven equality returns exactly the rows a full scan would.
#[test]
fn test_index_matches_full_scan() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());
    let table = db.table("orders").unwrap();

    for (column, value) in [
        ("customer", Value::Text("Bob".into())),
        ("amount", Value::number(40)),
        ("discount", Value::number(1)),
        ("customer", Value::Text("Nobody".into())),
    ] {
        let cond = Condition::Equals {
            column: column.into(),
            value,
        };
        let indexed = ids(&db.select("orders", &cond, None, 0).unwrap());

        let mut scanned = Vec::new();
        for partition in table.partitions() {
            scanned.extend(
                table
                    .scan_partition(partition)
                    .unwrap()
                    .into_iter()
                    .filter(|r| cond.filter(r)),
            );
        }
        assert_eq!(indexed, ids(&scanned), "{cond:?}");
    }
}

/// 1000 distinct values with a split threshold of 10 forces deep
/// repartitioning; ranges must still enumerate exactly.
#[test]
fn test_range_correct_across_repartitions() {
    init_tracing();
    let dir = tempdir().unwrap();
    let db = Database::open(
        Config::builder()
            .root(dir.path())
            .numeric_partition_size(10)
            .build(),
    )
    .unwrap();
    db.create_table(orders_schema()).unwrap();

    for chunk in (0..1000i64).collect::<Vec<_>>().chunks(50) {
        let mut rows: Vec<Row> = chunk
            .iter()
            .map(|i| order(*i, "x", *i, (2024, 1, 1), 0))
            .collect();
        db.insert("orders", "p0", &mut rows).unwrap();
    }

    let above = db
        .select("orders", &Condition::greater_than("amount", 700), None, 0)
        .unwrap();
    assert_eq!(ids(&above), (701..1000).collect::<Vec<_>>());

    let below = db
        .select("orders", &Condition::less_than("amount", 300), None, 0)
        .unwrap();
    assert_eq!(ids(&below), (0..300).collect::<Vec<_>>());

    let band = db
        .select(
            "orders",
            &Condition::greater_than("amount", 449).and(Condition::less_than("amount", 460)),
            None,
            0,
        )
        .unwrap();
    assert_eq!(ids(&band), (450..460).collect::<Vec<_>>());
}

#[test]
fn test_and_set_equal_regardless_of_driver() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());
    let a = Condition::equals("customer", "Bob");
    let b = Condition::greater_than("amount", 20);

    let ab = ids(&db.select("orders", &a.clone().and(b.clone()), None, 0).unwrap());
    let ba = ids(&db.select("orders", &b.and(a), None, 0).unwrap());
    assert_eq!(ab, vec![5]);
    assert_eq!(ab, ba);
}

/// Concatenated pages reassemble the unpaginated result without overlap or
/// gap.
#[test]
fn test_pagination_reassembles() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());
    let cond = Condition::greater_than("amount", 0);
    let full = db.select("orders", &cond, None, 0).unwrap();
    assert_eq!(full.len(), 5);

    for limit in 1..=3usize {
        let mut paged = Vec::new();
        let mut offset = 0;
        loop {
            let page = db.select("orders", &cond, Some(limit), offset).unwrap();
            if page.is_empty() {
                break;
            }
            assert!(page.len() <= limit);
            offset += page.len();
            paged.extend(page);
        }
        assert_eq!(ids(&paged), ids(&full), "limit {limit}");
        assert_eq!(paged.len(), full.len(), "limit {limit}");
    }
}

/// Delete every discounted order, roll the statements back, and the
/// discounted set reappears in full.
#[test]
fn test_discount_delete_then_rollback() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());
    let cond = Condition::equals("discount", Value::number(1));
    let discounted = db.select("orders", &cond, None, 0).unwrap();
    assert_eq!(ids(&discounted), vec![2, 3, 5]);

    db.delete("orders", &discounted).unwrap();
    assert!(db.select("orders", &cond, None, 0).unwrap().is_empty());

    db.rollback("orders", "p0").unwrap();
    db.rollback("orders", "p1").unwrap();
    assert_eq!(ids(&db.select("orders", &cond, None, 0).unwrap()), vec![2, 3, 5]);
}

/// Update is one statement: one rollback returns to the pre-update row.
#[test]
fn test_update_then_rollback() {
    let dir = tempdir().unwrap();
    let db = seeded(dir.path());

    let old = db
        .select("orders", &Condition::equals("id", Value::number(1)), None, 0)
        .unwrap();
    let mut new = vec![order(1, "Alice", 99, (2024, 1, 1), 0)];
    db.update("orders", "p0", &old, &mut new).unwrap();

    let found = db
        .select("orders", &Condition::equals("id", Value::number(1)), None, 0)
        .unwrap();
    assert_eq!(found[0].get("amount"), Some(&Value::number(99)));

    db.rollback("orders", "p0").unwrap();
    let found = db
        .select("orders", &Condition::equals("id", Value::number(1)), None, 0)
        .unwrap();
    assert_eq!(found[0].get("amount"), Some(&Value::number(10)));
}

/// Light mode keeps statement semantics with whole-file rewrites and no
/// bookkeeping files.
#[test]
fn test_light_mode_statements() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    let schema = TableBuilder::new("notes")
        .unwrap()
        .add_column("id", ValueType::Number)
        .unwrap()
        .add_column("body", ValueType::Text)
        .unwrap()
        .mode(Mode::Light)
        .build()
        .unwrap();
    db.create_table(schema).unwrap();

    let mut rows: Vec<Row> = (1..=3)
        .map(|id| {
            let mut row = Row::new("notes");
            row.set("id", Value::number(id))
                .set("body", Value::Text(format!("note {id}")));
            row
        })
        .collect();
    db.insert("notes", "p0", &mut rows).unwrap();

    let table = db.table("notes").unwrap();
    assert!(!table.empties_path("p0").exists());
    assert_eq!(table.total_size().unwrap(), 3);

    let found = db
        .select("notes", &Condition::equals("id", Value::number(2)), None, 0)
        .unwrap();
    db.delete("notes", &found).unwrap();
    assert_eq!(db.table("notes").unwrap().total_size().unwrap(), 2);

    db.rollback("notes", "p0").unwrap();
    assert_eq!(db.table("notes").unwrap().total_size().unwrap(), 3);
}
