use chrono::Utc;
use journal_goals::db::{Database, GoalStore};
use journal_goals::error::{ErrorKind, GoalError};
use journal_goals::models::*;
use speculate2::speculate;

fn create_article(db: &Database, title: &str) -> Article {
    db.create_article(CreateArticleInput {
        title: title.to_string(),
        content: None,
    })
    .expect("Failed to create article")
}

fn insert_goal(db: &Database, user_id: i64, articles: &[i64]) -> i64 {
    db.transaction(|store| {
        let id = store
            .insert_goal(user_id, "Read up", "daily", articles, Utc::now())
            .expect("Failed to insert goal");
        for article_id in articles {
            store
                .insert_progress(id, *article_id)
                .expect("Failed to insert progress");
        }
        Ok(id)
    })
    .expect("Transaction failed")
}

fn read<T>(db: &Database, f: impl FnOnce(&GoalStore<'_>) -> rusqlite::Result<T>) -> T {
    db.read(|store| Ok(f(store).expect("Query failed")))
        .expect("Read failed")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "articles" {
        describe "create_article" {
            it "assigns increasing ids" {
                let first = create_article(&db, "Breathing basics");
                let second = create_article(&db, "Sleep hygiene");

                assert!(second.id > first.id);
                assert_eq!(first.title, "Breathing basics");
            }

            it "rejects an empty title" {
                let result = db.create_article(CreateArticleInput {
                    title: "  ".to_string(),
                    content: None,
                });

                let err = result.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Validation);
                assert!(db.get_all_articles().expect("Query failed").is_empty());
            }
        }

        describe "get_article" {
            it "returns None for a missing article" {
                assert!(db.get_article(42).expect("Query failed").is_none());
            }

            it "returns the stored article" {
                let created = db.create_article(CreateArticleInput {
                    title: "Gratitude".to_string(),
                    content: Some("Write three things".to_string()),
                }).expect("Failed to create");

                let found = db.get_article(created.id).expect("Query failed").unwrap();
                assert_eq!(found, created);
            }
        }

        describe "get_all_articles" {
            it "returns articles ordered by id" {
                create_article(&db, "B");
                create_article(&db, "A");

                let articles = db.get_all_articles().expect("Query failed");
                assert_eq!(articles.len(), 2);
                assert_eq!(articles[0].title, "B");
                assert_eq!(articles[1].title, "A");
            }
        }

        describe "find_missing_articles" {
            it "returns nothing for an empty request" {
                assert!(db.find_missing_articles(&[]).expect("Query failed").is_empty());
            }

            it "returns unknown ids in request order without duplicates" {
                let known = create_article(&db, "Known");

                let missing = db
                    .find_missing_articles(&[99, known.id, 77, 99])
                    .expect("Query failed");

                assert_eq!(missing, vec![99, 77]);
            }

            it "handles more ids than SQLite accepts as parameters" {
                let known = create_article(&db, "Known");
                let mut ids: Vec<i64> = (1_000..41_000).collect();
                ids.insert(20_000, known.id);

                let missing = db.find_missing_articles(&ids).expect("Query failed");

                assert_eq!(missing.len(), 40_000);
                assert_eq!(missing.first(), Some(&1_000));
                assert_eq!(missing.last(), Some(&40_999));
                assert!(!missing.contains(&known.id));
            }
        }
    }

    describe "goal store" {
        describe "insert_goal" {
            it "stores the article set and incomplete progress rows" {
                let id = insert_goal(&db, 7, &[10, 11]);

                let goal = read(&db, |s| s.get_goal(id, 7)).expect("Goal missing");
                assert_eq!(goal.user_id, 7);
                assert_eq!(goal.articles_to_read, vec![10, 11]);
                assert!(!goal.completed);

                let progress = read(&db, |s| s.get_progress(id, 7));
                assert_eq!(progress.len(), 2);
                assert!(progress.iter().all(|p| !p.completed && p.date_completed.is_none()));
            }

            it "rolls back when the closure fails" {
                let result: Result<(), GoalError> = db.transaction(|store| {
                    store
                        .insert_goal(7, "Read up", "daily", &[1], Utc::now())
                        .expect("Failed to insert goal");
                    Err(GoalError::Validation("abort".to_string()))
                });

                assert!(result.is_err());
                assert!(read(&db, |s| s.list_goals(7)).is_empty());
            }
        }

        describe "get_goal" {
            it "does not return goals owned by another user" {
                let id = insert_goal(&db, 7, &[]);

                assert!(read(&db, |s| s.get_goal(id, 8)).is_none());
            }
        }

        describe "list_goals" {
            it "returns only goals of that user in creation order" {
                let first = insert_goal(&db, 7, &[]);
                insert_goal(&db, 8, &[]);
                let second = insert_goal(&db, 7, &[]);

                let goals = read(&db, |s| s.list_goals(7));
                let ids: Vec<i64> = goals.iter().map(|g| g.id).collect();
                assert_eq!(ids, vec![first, second]);
            }
        }

        describe "upsert_progress" {
            it "keeps a single row per goal and article" {
                let id = insert_goal(&db, 7, &[10]);
                let now = Utc::now();

                db.transaction(|s| {
                    s.upsert_progress(id, 10, true, Some(now)).expect("Upsert failed");
                    s.upsert_progress(id, 10, true, Some(now)).expect("Upsert failed");
                    Ok(())
                }).expect("Transaction failed");

                let progress = read(&db, |s| s.get_progress(id, 7));
                assert_eq!(progress.len(), 1);
                assert!(progress[0].completed);
                assert_eq!(progress[0].date_completed, Some(now));
            }

            it "clears the completion date when reopened" {
                let id = insert_goal(&db, 7, &[10]);

                db.transaction(|s| {
                    s.upsert_progress(id, 10, true, Some(Utc::now())).expect("Upsert failed");
                    s.upsert_progress(id, 10, false, None).expect("Upsert failed");
                    Ok(())
                }).expect("Transaction failed");

                let progress = read(&db, |s| s.get_progress(id, 7));
                assert!(!progress[0].completed);
                assert!(progress[0].date_completed.is_none());
            }
        }

        describe "count_completed_progress" {
            it "counts only completed rows" {
                let id = insert_goal(&db, 7, &[1, 2, 3]);

                db.transaction(|s| {
                    s.upsert_progress(id, 2, true, Some(Utc::now())).expect("Upsert failed");
                    Ok(())
                }).expect("Transaction failed");

                assert_eq!(read(&db, |s| s.count_completed_progress(id)), 1);
            }
        }

        describe "insert_progress" {
            it "leaves an existing row untouched" {
                let id = insert_goal(&db, 7, &[1]);

                db.transaction(|s| {
                    s.upsert_progress(id, 1, true, Some(Utc::now())).expect("Upsert failed");
                    s.insert_progress(id, 1).expect("Insert failed");
                    Ok(())
                }).expect("Transaction failed");

                let progress = read(&db, |s| s.get_progress(id, 7));
                assert_eq!(progress.len(), 1);
                assert!(progress[0].completed);
            }
        }

        describe "delete_progress" {
            it "removes only the listed articles" {
                let id = insert_goal(&db, 7, &[1, 2, 3]);

                let removed = db.transaction(|s| Ok(s.delete_progress(id, &[1, 3]).expect("Delete failed")))
                    .expect("Transaction failed");

                assert_eq!(removed, 2);
                assert_eq!(read(&db, |s| s.tracked_article_ids(id)), vec![2]);
            }
        }

        describe "delete_all_progress" {
            it "ignores goals owned by another user" {
                let id = insert_goal(&db, 7, &[1, 2]);

                let removed = db.transaction(|s| Ok(s.delete_all_progress(id, 8).expect("Delete failed")))
                    .expect("Transaction failed");

                assert_eq!(removed, 0);
                assert_eq!(read(&db, |s| s.tracked_article_ids(id)), vec![1, 2]);
            }
        }

        describe "delete_goal" {
            it "cascades to progress rows" {
                let id = insert_goal(&db, 7, &[1, 2]);

                let rows = db.transaction(|s| Ok(s.delete_goal(id, 7).expect("Delete failed")))
                    .expect("Transaction failed");

                assert_eq!(rows, 1);
                assert!(read(&db, |s| s.tracked_article_ids(id)).is_empty());
            }
        }
    }
}

mod file_database {
    use super::*;

    #[test]
    fn persists_goals_across_reopen() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("goals.db");

        let id = {
            let db = Database::open(path.clone()).expect("Failed to open database");
            db.migrate().expect("Failed to migrate");
            insert_goal(&db, 3, &[5])
        };

        let db = Database::open(path).expect("Failed to reopen database");
        db.migrate().expect("Failed to migrate");
        let goal = read(&db, |s| s.get_goal(id, 3)).expect("Goal missing");
        assert_eq!(goal.articles_to_read, vec![5]);
    }
}
