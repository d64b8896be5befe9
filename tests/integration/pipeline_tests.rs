use super::*;
use antique_watchdog::pipeline;
use antique_watchdog::store::QueryStore;
use antique_watchdog::{AppError, Constraint, Job, Query, Relation};

#[tokio::test]
async fn test_egan_query_yields_only_matching_record() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_workspace(dir.path(), EGAN_QUERIES);

    let queries = YamlQueryStore::new(dir.path().join("queries.yaml")).fetch_queries().await?;
    let scrapers = shelf_registry(shelf_books()).discover(&dir.path().join("scrapers"))?;

    let results = pipeline::collect(&queries, &scrapers).await?;
    assert_eq!(results, vec![book("Diaspora", "Greg Egan")]);
    Ok(())
}

#[tokio::test]
async fn test_diacritics_fold_when_normalizing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_workspace(
        dir.path(),
        r#"
- query_string: capek
  constraint_list:
    - key: author
      value: CAPEK
      relation: in
"#,
    );

    let task = build_task(
        dir.path(),
        Arc::new(ConfigStore::in_memory(valid_settings())),
        Arc::new(RecordingMailer::default()),
    );

    let results = task.collect().await?;
    assert_eq!(results, vec![book("Krakatit", "Karel Čapek")]);
    Ok(())
}

#[tokio::test]
async fn test_exact_match_keeps_diacritics() -> anyhow::Result<()> {
    let queries = vec![Query::new(
        "capek",
        vec![Constraint::new("author", Relation::Contains, "capek").with_normalize(false)],
    )];
    let scrapers: Vec<ScraperBox> = vec![Box::new(Shelf { records: shelf_books() })];

    let results = pipeline::collect(&queries, &scrapers).await?;
    assert!(results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_task_run_mails_filtered_records() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_workspace(dir.path(), EGAN_QUERIES);
    let mailer = Arc::new(RecordingMailer::default());

    let task = build_task(dir.path(), Arc::new(ConfigStore::in_memory(valid_settings())), mailer.clone());
    let outcome = task.execute().await;

    let report = outcome.result?;
    assert_eq!(report.record_count, 1);
    assert_eq!(report.recipient, "reader@example.com");
    assert_eq!(mailer.deliveries(), vec![vec![book("Diaspora", "Greg Egan")]]);
    Ok(())
}

#[tokio::test]
async fn test_empty_result_is_still_mailed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_workspace(
        dir.path(),
        r#"
- query_string: asimov
  constraint_list:
    - key: author
      value: asimov
      relation: in
"#,
    );
    let mailer = Arc::new(RecordingMailer::default());

    let task = build_task(dir.path(), Arc::new(ConfigStore::in_memory(valid_settings())), mailer.clone());
    let report = task.execute().await.result?;

    assert_eq!(report.record_count, 0);
    assert_eq!(mailer.deliveries(), vec![Vec::<Record>::new()]);
    Ok(())
}

#[tokio::test]
async fn test_missing_queries_file_aborts_before_mail() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_workspace(dir.path(), EGAN_QUERIES);
    std::fs::remove_file(dir.path().join("queries.yaml"))?;
    let mailer = Arc::new(RecordingMailer::default());

    let task = build_task(dir.path(), Arc::new(ConfigStore::in_memory(valid_settings())), mailer.clone());
    let outcome = task.execute().await;

    assert!(matches!(outcome.result, Err(AppError::QueriesUnavailable(_))));
    assert!(mailer.deliveries().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_scraper_kind_fails_discovery() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_workspace(dir.path(), EGAN_QUERIES);
    std::fs::write(
        dir.path().join("scrapers").join("antikvariat.toml"),
        "[[scraper]]\nkind = \"antikvariat\"\n",
    )?;
    let mailer = Arc::new(RecordingMailer::default());

    let task = build_task(dir.path(), Arc::new(ConfigStore::in_memory(valid_settings())), mailer.clone());
    let outcome = task.execute().await;

    assert!(matches!(outcome.result, Err(AppError::PluginLoad { .. })));
    assert!(mailer.deliveries().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_new_manifest_is_used_on_next_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_workspace(dir.path(), EGAN_QUERIES);

    let mut registry = shelf_registry(shelf_books());
    registry.register_factory("annex", |_table: &toml::Table, _ctx: &ScraperContext| {
        Ok(Box::new(Shelf {
            records: vec![book("Quarantine", "Greg Egan")],
        }) as ScraperBox)
    });
    let task = Task::new(
        Arc::new(ConfigStore::in_memory(valid_settings())),
        Arc::new(YamlQueryStore::new(dir.path().join("queries.yaml"))),
        Arc::new(registry),
        dir.path().join("scrapers"),
        Arc::new(RecordingMailer::default()),
    );

    assert_eq!(task.collect().await?, vec![book("Diaspora", "Greg Egan")]);

    std::fs::write(
        dir.path().join("scrapers").join("annex.toml"),
        "[[scraper]]\nkind = \"annex\"\n",
    )?;

    // manifests load in file-name order: annex.toml before shelf.toml
    assert_eq!(
        task.collect().await?,
        vec![book("Quarantine", "Greg Egan"), book("Diaspora", "Greg Egan")]
    );
    Ok(())
}
