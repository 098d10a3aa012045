use querykit::config::Config;
use querykit::error::QueryError;
use tempfile::TempDir;

#[test]
fn test_saved_defaults_load_back() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");

    Config::default().save(&path).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[documents]"));
    assert!(content.contains("chunk_size = 500"));

    let config = Config::load(&path).unwrap();
    assert_eq!(config.documents.retrieve_k, 4);
    assert_eq!(config.documents.context_k, 3);
    assert_eq!(config.sql.examples_k, 2);
    assert_eq!(config.llm.model, "gemini-2.5-flash");
    assert_eq!(config.embedding.model, "models/gemini-embedding-001");
}

#[test]
fn test_invalid_file_reports_every_problem() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");

    let mut config = Config::default();
    config.documents.chunk_overlap = config.documents.chunk_size;
    config.llm.temperature = 3.5;
    config.embedding.batch_size = 0;
    config.save(&path).unwrap();

    match Config::load(&path) {
        Err(QueryError::ConfigValidation { errors }) => {
            let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
            assert!(paths.contains(&"documents.chunk_overlap"), "{:?}", paths);
            assert!(paths.contains(&"llm.temperature"), "{:?}", paths);
            assert!(paths.contains(&"embedding.batch_size"), "{:?}", paths);
        }
        other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    let config = Config::load_or_default(Some(&temp.path().join("absent.toml"))).unwrap();
    assert_eq!(config.documents.chunk_overlap, 100);

    let err = Config::load(&temp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, QueryError::ConfigNotFound { .. }));
}
