use domain::ActivePattern;
use lightd_storage::{ActivePatternStore, InMemoryActivePatternStore};

#[tokio::test]
async fn starts_at_sentinel_and_last_write_wins() {
    let store = InMemoryActivePatternStore::new();
    let initial = store.current().await.expect("current");
    assert_eq!(initial.name, "off");
    assert_eq!(initial.applied_at, 0);

    for (name, at) in [("evening", 10), ("movie", 20)] {
        store
            .set_current(ActivePattern {
                name: name.to_string(),
                applied_at: at,
            })
            .await
            .expect("set");
    }
    let current = store.current().await.expect("current");
    assert_eq!(current.name, "movie");
    assert_eq!(current.applied_at, 20);
}
