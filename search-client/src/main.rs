use std::sync::mpsc;

use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use search_client::{ClientSetupError, Dependencies};
use search_client_repository::{queries, IndexSettings};
use search_client_shared::ClusterHealth;

/// Sample document loaded by the walkthrough.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Article {
    title: String,
    tag: String,
    published_at: DateTime<Utc>,
}

fn sample_articles(count: usize) -> Vec<(Option<String>, Article)> {
    let tags = ["async", "search", "streams"];
    let start = Utc::now();
    (0..count)
        .map(|i| {
            let article = Article {
                title: format!("Article number {}", i),
                tag: tags[i % tags.len()].to_string(),
                published_at: start - Duration::hours(i as i64),
            };
            (Some(format!("article-{}", i)), article)
        })
        .collect()
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Cluster health through the callback, blocking and async entry points.
async fn check_health(deps: &Dependencies, token: &CancellationToken) -> Result<(), ClientSetupError> {
    let (tx, rx) = mpsc::channel();
    let failure_tx = tx.clone();
    let _handle = deps.admin.health_with_callback(
        Box::new(move |health: ClusterHealth| {
            let _ = tx.send(Ok(health));
        }),
        Box::new(move |err| {
            let _ = failure_tx.send(Err(err));
        }),
    );
    let from_callback = tokio::task::spawn_blocking(move || rx.recv())
        .await?
        .map_err(|_| ClientSetupError::config("health callback was dropped"))??;
    info!(status = ?from_callback.status, "Cluster health (callback)");

    let admin = deps.admin.clone();
    let blocking = tokio::task::spawn_blocking(move || admin.health_blocking()).await??;
    info!(status = ?blocking.status, "Cluster health (blocking)");

    let health = deps.admin.health(token).await?;
    info!(
        status = ?health.status,
        nodes = health.number_of_nodes,
        "Cluster health (async)"
    );

    if !health.is_usable() {
        return Err(ClientSetupError::config("OpenSearch cluster is unhealthy"));
    }
    Ok(())
}

async fn run(deps: Dependencies, token: CancellationToken) -> Result<(), ClientSetupError> {
    check_health(&deps, &token).await?;

    let articles = deps.repository::<Article>();
    articles.delete_index(&token).await?;

    let settings = IndexSettings::new()
        .replicas(0)
        .text("title")
        .keyword("tag")
        .date("published_at");
    articles.create_index(Some(settings.to_body()), &token).await?;

    let summary = articles.bulk(sample_articles(250), &token).await?;
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Loaded sample articles"
    );
    articles.refresh(&token).await?;

    let total = articles.count(None, &token).await?;
    let tagged = articles
        .count(Some(queries::term("tag", "streams")), &token)
        .await?;
    info!(total, tagged, "Counted articles");

    let top = articles
        .search(queries::match_text("title", "number 42"), &token)
        .await?;
    if let Some(hit) = top.hits.first() {
        info!(id = %hit.id, score = ?hit.score, title = %hit.source.title, "Best match");
    }

    // Only the first ten hits are consumed; the rest of the scroll is never fetched.
    let mut stream = articles
        .search_stream(queries::term("tag", "async"), &token)
        .await?;
    let mut seen = 0;
    while let Some(hit) = stream.try_next().await? {
        info!(id = %hit.id, published_at = %hit.source.published_at, "Streamed hit");
        seen += 1;
        if seen == 10 {
            break;
        }
    }
    drop(stream);

    articles.delete_index(&token).await?;
    info!("Walkthrough finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding requests");
            on_signal.cancel();
        }
    });

    let deps = match Dependencies::new() {
        Ok(deps) => deps,
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(deps, token).await {
        error!(error = %e, "Walkthrough failed");
        std::process::exit(1);
    }
}
