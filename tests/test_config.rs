//! Configuration file handling

use booksearch::config::Config;
use booksearch::error::BookSearchError;
use tempfile::TempDir;

#[test]
fn test_save_then_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.retrieval.top_n = 7;
    config.vector_store.collection = "books_test".to_string();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.retrieval.top_n, 7);
    assert_eq!(loaded.vector_store.collection, "books_test");
    assert_eq!(loaded.server.max_workers, 10);
}

#[test]
fn test_missing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.toml");

    assert!(matches!(
        Config::load(&path),
        Err(BookSearchError::ConfigNotFound { .. })
    ));

    let fallback = Config::load_or_default(&path).unwrap();
    assert_eq!(fallback.retrieval.fusion_top_k, 50);
}

#[test]
fn test_invalid_file_reports_all_problems() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [server]
        max_workers = 0

        [cache]
        structured_ttl_secs = 0

        [extraction]
        temperature = 3.0
        "#,
    )
    .unwrap();

    match Config::load(&path) {
        Err(BookSearchError::ConfigValidation { errors }) => {
            assert_eq!(errors.len(), 3);
        }
        other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_malformed_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[server\nmax_workers = ").unwrap();

    assert!(matches!(Config::load(&path), Err(BookSearchError::Toml(_))));
}
