use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::news::importer::ImportRunner;

/// Spawn the periodic news import.
///
/// The first run starts immediately, then one every `period`. A run that
/// overruns the period delays the next tick instead of bursting.
pub fn spawn_periodic_import(runner: Arc<ImportRunner>, period: Duration) -> JoinHandle<()> {
    tracing::info!("Scheduling news import every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            runner.run().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::client::{MockNewsSource, NewsArticle};
    use crate::news::importer::NewsAuthor;
    use crate::test_support::MemoryPostRepo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_start_and_every_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut source = MockNewsSource::new();
        source.expect_top_headlines().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![NewsArticle {
                title: format!("Story {n}"),
                description: None,
                content: None,
                url: format!("https://news.test/{n}"),
                image_url: None,
                source_name: None,
                published_at: None,
            }])
        });

        let posts = Arc::new(MemoryPostRepo::new());
        let runner = Arc::new(ImportRunner::new(
            posts.clone(),
            Arc::new(source),
            vec!["general".to_string()],
            NewsAuthor {
                id: "n".into(),
                username: "newsbot".into(),
            },
        ));

        let period = Duration::from_secs(60);
        let handle = spawn_periodic_import(runner, period);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "runs immediately on start");

        tokio::time::sleep(period).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "runs again after one period");

        handle.abort();
        assert_eq!(posts.posts.lock().unwrap().len(), 2);
    }
}
