//! Serve command handler
//!
//! Runs the index coordinator on a background task and answers queries over
//! stdio, one JSON object per line:
//!
//! ```text
//! stdin:  {"label": "testfile1.txt"}
//! stdout: {"data":[{"path":"/data/a.prov","entity":{"label":"testfile1.txt",...},...}]}
//! ```
//!
//! Logs go to stderr so stdout carries only responses. The server stops on
//! EOF, Ctrl-C, or when the coordinator fails; the coordinator is always
//! cancelled and awaited before returning.

use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;
use crate::coordinator::{CoordinatorState, IndexCoordinator};
use crate::error::{IndexError, Result};
use crate::query::{Query, QueryEngine};

/// Run the serve command
///
/// This creates a tokio runtime and runs the coordinator and the stdio
/// query loop in it.
pub fn run_serve(config: &IndexerConfig) -> Result<String> {
    let runtime = tokio::runtime::Runtime::new()?;
    let served = runtime.block_on(serve_async(config));

    // A stdin read parked on the blocking pool must not keep the process
    // alive after Ctrl-C or a fatal indexing error
    runtime.shutdown_background();
    served?;

    // Responses were streamed; nothing left to print
    Ok(String::new())
}

async fn serve_async(config: &IndexerConfig) -> Result<()> {
    tracing::info!("Starting prov-index v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Watched root: {}", config.root.display());

    let coordinator = IndexCoordinator::from_config(config)?;
    let engine = QueryEngine::new(coordinator.reader());
    let mut status = coordinator.status();
    let shutdown = CancellationToken::new();
    let mut task = coordinator.spawn(shutdown.clone());

    // Fail fast on an unusable root before accepting queries
    let ready = status
        .wait_for(|s| {
            matches!(
                s.state,
                CoordinatorState::Watching | CoordinatorState::Stopped
            )
        })
        .await;
    if ready.map_or(true, |s| s.state == CoordinatorState::Stopped) {
        return join_result(task.await);
    }

    tracing::info!("Index ready, waiting for queries...");

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let served = tokio::select! {
        served = serve_lines(&engine, stdin, stdout) => served,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(0)
        }
        joined = &mut task => return join_result(joined),
    };

    shutdown.cancel();
    let stopped = join_result(task.await);

    let served = served?;
    tracing::info!("Served {} queries, shutting down", served);
    stopped
}

/// Answer every query line from `input` on `output` until EOF. Returns the
/// number of requests answered.
pub async fn serve_lines<R, W>(engine: &QueryEngine, input: R, mut output: W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut served = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_request(engine, line);
        output.write_all(response.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        served += 1;
    }

    Ok(served)
}

/// Turn one JSON request line into one JSON response line
pub fn handle_request(engine: &QueryEngine, line: &str) -> String {
    let query: Query = match serde_json::from_str(line) {
        Ok(query) => query,
        Err(e) => {
            tracing::debug!("Rejected request {:?}: {}", line, e);
            return json!({ "error": format!("invalid query: {}", e) }).to_string();
        }
    };

    let response = engine.execute(&query);
    serde_json::to_string(&response).unwrap_or_else(|e| {
        json!({ "error": format!("failed to encode response: {}", e) }).to_string()
    })
}

fn join_result(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| {
        IndexError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("index task failed: {}", e),
        ))
    })?
}
