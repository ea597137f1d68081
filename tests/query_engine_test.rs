// End-to-end runs over on-disk fixtures
use carquery::executor::{
    run_in_process, run_participant, CoordinatorInput, FlushMode, SequentialExecutor,
    SharedEmitter, SharedMemoryExecutor,
};
use carquery::network::{CoordinatorListener, TcpCommunicator};
use carquery::types::{Query, QueryError};
use carquery::{load_database, load_queries, RecordStore};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

const DATABASE: &str = "\
ID Model YearMake Color Price Dealer
5 Accord 2018 White 17500 Sonic
1 Civic 2016 Blue 15200 Sonic
3 Civic 2021 Black 19800 Ganley

2 Camry 2020 Red 21000 Pohanka
4 Corolla 2012 Blue 8900 AVeryLongDealershipNameThatGetsCut
";

const QUERIES: &str = "\
SELECT ID,Price FROM cars WHERE Model = \"Civic\" AND Price > 15000;
SELECT * FROM cars WHERE Color != \"Blue\" OR YearMake >= 2021
this line is not a query

SELECT Dealer, Model FROM cars WHERE Color = \"blue\" OR Model = \"Camry\" AND Price < 20000
SELECT Model FROM cars WHERE
";

fn fixture(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load_fixtures() -> (RecordStore, Vec<Query>) {
    let db = fixture(DATABASE);
    let sql = fixture(QUERIES);
    (load_database(db.path()).unwrap(), load_queries(sql.path()).unwrap())
}

fn sequential_output(store: &RecordStore, queries: &[Query]) -> String {
    let mut out = Vec::new();
    SequentialExecutor::run(store, queries, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn sorted(output: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = output.lines().collect();
    lines.sort_unstable();
    lines
}

#[test]
fn test_sequential_output_from_files() {
    let (store, queries) = load_fixtures();
    assert_eq!(store.count(), 5);
    assert_eq!(queries.len(), 4);

    // Third query groups as Blue OR (Camry AND Price < 20000); the last one has an empty WHERE
    let expected = "\
1 15200
3 19800
2 Camry 2020 Red 21000 Pohanka
3 Civic 2021 Black 19800 Ganley
5 Accord 2018 White 17500 Sonic
Sonic Civic
AVeryLongDealership Corolla
Civic
Camry
Civic
Corolla
Accord
";
    assert_eq!(sequential_output(&store, &queries), expected);
}

#[test]
fn test_shared_memory_matches_sequential() {
    let (store, queries) = load_fixtures();
    let expected = sequential_output(&store, &queries);

    for threads in [1, 2, 7] {
        let executor = SharedMemoryExecutor::new(threads, 2).unwrap();
        let emitter = SharedEmitter::new(Vec::new());
        executor.run(&store, &queries, &emitter).unwrap();
        let output = String::from_utf8(emitter.into_inner()).unwrap();
        assert_eq!(sorted(&output), sorted(&expected), "threads={threads}");
    }
}

#[tokio::test]
async fn test_in_process_distributed_matches_sequential() {
    let (store, queries) = load_fixtures();
    let expected = sequential_output(&store, &queries);

    for flush in [FlushMode::RankOrdered, FlushMode::Gather] {
        let input = CoordinatorInput {
            records: store.snapshot().unwrap(),
            queries: queries.clone(),
            flush,
        };
        let emitter = Arc::new(SharedEmitter::new(Vec::new()));
        let report = run_in_process(input, 3, 16, Arc::clone(&emitter)).await.unwrap();
        assert_eq!(report.participants, 3);
        assert_eq!(report.local_records, 2);

        let output = Arc::try_unwrap(emitter).ok().unwrap().into_inner();
        assert_eq!(String::from_utf8(output).unwrap(), expected, "flush={flush:?}");
    }
}

#[tokio::test]
async fn test_tcp_distributed_gathers_at_coordinator() {
    let (store, queries) = load_fixtures();
    let expected = sequential_output(&store, &queries);

    let listener = CoordinatorListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let workers: Vec<_> = (1..4)
        .map(|rank| {
            tokio::spawn(async move {
                let mut comm = TcpCommunicator::connect(addr, rank).await.unwrap();
                let emitter = SharedEmitter::new(Vec::new());
                let report = run_participant(&mut comm, None, &emitter).await.unwrap();
                (report, emitter.into_inner())
            })
        })
        .collect();

    let mut root = listener.accept(4, 32).await.unwrap();
    let input = CoordinatorInput {
        records: store.snapshot().unwrap(),
        queries,
        flush: FlushMode::Gather,
    };
    let emitter = SharedEmitter::new(Vec::new());
    let report = run_participant(&mut root, Some(input), &emitter).await.unwrap();
    assert_eq!(report.participants, 4);

    let mut held = report.local_records;
    for worker in workers {
        let (report, output) = worker.await.unwrap();
        assert!(output.is_empty());
        held += report.local_records;
    }
    assert_eq!(held, 5);
    assert_eq!(String::from_utf8(emitter.into_inner()).unwrap(), expected);
}

#[test]
fn test_missing_files_are_reported() {
    let missing = Path::new("/nonexistent/carquery/db.txt");
    assert!(matches!(load_database(missing), Err(QueryError::FileNotFound(_))));
    assert!(matches!(load_queries(missing), Err(QueryError::FileNotFound(_))));
}

#[test]
fn test_database_without_header_is_rejected() {
    let empty = fixture("");
    assert!(matches!(
        load_database(empty.path()),
        Err(QueryError::MissingHeader(_))
    ));
}
