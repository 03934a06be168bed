use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::solver::{ChallengeAction, ChallengePayload, ChallengeResponse, Solver};

/// Serves challenge payloads, one JSON document per input line, until the
/// input ends or shutdown is signalled.
///
/// Every request is handled on its own task so independent challenges do not
/// wait on each other. One response line is written per request, in
/// completion order; responses carry the request `uid`.
pub async fn serve<R, W>(
    solver: Arc<dyn Solver>,
    input: R,
    mut output: W,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut tasks = JoinSet::new();

    info!("Solver {} ready for challenges", solver.name());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read challenge payload")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let solver = Arc::clone(&solver);
                        tasks.spawn(async move { handle_payload(solver.as_ref(), &line).await });
                    }
                    None => break,
                }
            }
            Some(done) = tasks.join_next() => {
                if let Some(payload) = task_payload(done) {
                    write_payload(&mut output, &payload).await?;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutdown signal received, no longer accepting challenges");
                    break;
                }
            }
        }
    }

    while let Some(done) = tasks.join_next().await {
        if let Some(payload) = task_payload(done) {
            write_payload(&mut output, &payload).await?;
        }
    }

    Ok(())
}

fn task_payload(done: Result<ChallengePayload, JoinError>) -> Option<ChallengePayload> {
    match done {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!("Challenge task failed: {}", e);
            None
        }
    }
}

async fn write_payload<W: AsyncWrite + Unpin>(output: &mut W, payload: &ChallengePayload) -> Result<()> {
    let mut line = serde_json::to_vec(payload).context("Failed to encode challenge response")?;
    line.push(b'\n');

    output
        .write_all(&line)
        .await
        .context("Failed to write challenge response")?;
    output.flush().await.context("Failed to flush challenge response")
}

/// Decodes one payload, runs the requested action and builds the response.
pub async fn handle_payload(solver: &dyn Solver, line: &str) -> ChallengePayload {
    let payload: ChallengePayload = match serde_json::from_str(line) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Discarding malformed challenge payload: {}", e);
            return ChallengePayload::response(ChallengeResponse::failure(
                "",
                format!("malformed challenge payload: {}", e),
            ));
        }
    };

    let Some(request) = payload.request else {
        return ChallengePayload::response(ChallengeResponse::failure(
            "",
            "challenge payload has no request",
        ));
    };

    let result = match request.action {
        Some(ChallengeAction::Present) => solver.present(&request).await,
        Some(ChallengeAction::CleanUp) => solver.cleanup(&request).await,
        None => {
            return ChallengePayload::response(ChallengeResponse::failure(
                &request.uid,
                "challenge request has no action",
            ));
        }
    };

    let response = match result {
        Ok(()) => ChallengeResponse::success(&request.uid),
        Err(e) => {
            error!(
                "{:?} failed for {}: {}",
                request.action, request.resolved_fqdn, e
            );
            ChallengeResponse::failure(&request.uid, e.to_string())
        }
    };

    ChallengePayload::response(response)
}

pub async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::error::SolverError;
    use crate::solver::ChallengeRequest;

    #[derive(Default)]
    struct RecordingSolver {
        calls: Mutex<Vec<(ChallengeAction, String)>>,
    }

    #[async_trait]
    impl Solver for RecordingSolver {
        fn name(&self) -> &str {
            "recording"
        }

        async fn initialize(
            &mut self,
            _cluster: kube::Config,
            _stop: watch::Receiver<bool>,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn present(&self, request: &ChallengeRequest) -> crate::error::Result<()> {
            if request.resolved_fqdn.starts_with("_crash.") {
                panic!("solver crashed");
            }
            self.calls
                .lock()
                .unwrap()
                .push((ChallengeAction::Present, request.resolved_fqdn.clone()));
            Ok(())
        }

        async fn cleanup(&self, request: &ChallengeRequest) -> crate::error::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((ChallengeAction::CleanUp, request.resolved_fqdn.clone()));
            Err(SolverError::UnknownRecordId {
                fqdn: request.resolved_fqdn.clone(),
            })
        }
    }

    fn request_line(uid: &str, action: &str, fqdn: &str) -> String {
        serde_json::json!({
            "apiVersion": "webhook.acme.cert-manager.io/v1alpha1",
            "kind": "ChallengePayload",
            "request": {
                "uid": uid,
                "action": action,
                "resolvedFQDN": fqdn,
                "resolvedZone": "example.com.",
                "key": "token",
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_handle_present() {
        let solver = RecordingSolver::default();
        let payload = handle_payload(
            &solver,
            &request_line("u1", "Present", "_acme-challenge.example.com."),
        )
        .await;

        let response = payload.response.unwrap();
        assert_eq!(response.uid, "u1");
        assert!(response.success);
        assert_eq!(
            solver.calls.lock().unwrap().as_slice(),
            &[(
                ChallengeAction::Present,
                "_acme-challenge.example.com.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_handle_failure_carries_message() {
        let solver = RecordingSolver::default();
        let payload = handle_payload(
            &solver,
            &request_line("u2", "CleanUp", "_acme-challenge.example.com."),
        )
        .await;

        let response = payload.response.unwrap();
        assert!(!response.success);
        assert_eq!(
            response.status.unwrap().message,
            "unknown record ID for \"_acme-challenge.example.com.\""
        );
    }

    #[tokio::test]
    async fn test_handle_malformed_payload() {
        let solver = RecordingSolver::default();
        let payload = handle_payload(&solver, "{not json").await;

        let response = payload.response.unwrap();
        assert!(!response.success);
        assert!(solver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serve_answers_every_line() {
        let solver = Arc::new(RecordingSolver::default());
        let input = format!(
            "{}\n\n{}\n{}\n",
            request_line("a", "Present", "_acme-challenge.a.example.com."),
            request_line("b", "Present", "_acme-challenge.b.example.com."),
            request_line("c", "CleanUp", "_acme-challenge.c.example.com."),
        );
        let (_tx, rx) = watch::channel(false);
        let mut output = Vec::new();

        serve(solver.clone(), input.as_bytes(), &mut output, rx)
            .await
            .unwrap();

        let mut responses: Vec<ChallengeResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<ChallengePayload>(l).unwrap())
            .map(|p| p.response.unwrap())
            .collect();
        responses.sort_by(|x, y| x.uid.cmp(&y.uid));

        assert_eq!(responses.len(), 3);
        assert!(responses[0].success);
        assert!(responses[1].success);
        assert!(!responses[2].success);
        assert_eq!(solver.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_serve_survives_crashed_task() {
        let solver = Arc::new(RecordingSolver::default());
        let input = format!(
            "{}\n{}\n{}\n",
            request_line("a", "Present", "_acme-challenge.a.example.com."),
            request_line("crash", "Present", "_crash.example.com."),
            request_line("b", "Present", "_acme-challenge.b.example.com."),
        );
        let (_tx, rx) = watch::channel(false);
        let mut output = Vec::new();

        serve(solver.clone(), input.as_bytes(), &mut output, rx)
            .await
            .unwrap();

        let mut uids: Vec<String> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<ChallengePayload>(l).unwrap())
            .map(|p| p.response.unwrap().uid)
            .collect();
        uids.sort();

        assert_eq!(uids, vec!["a".to_string(), "b".to_string()]);
    }
}
