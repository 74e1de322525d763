//! Workflow lifecycle controller.
//!
//! Issues generation calls, resolves them against [`WorkflowState`], and runs the command
//! loop that presentation layers talk to.

use super::state::{IssuedCall, WorkflowState};
use crate::model::{CallKind, WorkflowConfig, WorkflowEvent};
use crate::service::{self, GenerationService, Response, ServiceError};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    SetSitemapUrl(String),
    SubmitSitemap,
    ToggleTitle(String),
    GenerateOutlines,
    GenerateContent(String),
    Cancel,
    Quit,
}

/// Result of one call, ready to be applied with [`WorkflowController::finish`].
#[derive(Debug)]
pub struct CallOutcome {
    pub id: u64,
    pub kind: CallKind,
    pub result: Result<Response, ServiceError>,
}

/// A spawned generation call. Resolves exactly once.
pub struct PendingCall {
    id: u64,
    kind: CallKind,
    handle: JoinHandle<Result<Response, ServiceError>>,
}

impl PendingCall {
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub async fn wait(self) -> CallOutcome {
        let result = match self.handle.await {
            Ok(r) => r,
            Err(e) => Err(ServiceError::TaskFailed(e.to_string())),
        };
        CallOutcome {
            id: self.id,
            kind: self.kind,
            result,
        }
    }
}

pub struct WorkflowController<S: ?Sized> {
    state: WorkflowState,
    service: Arc<S>,
    call_timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl<S> WorkflowController<S>
where
    S: GenerationService + ?Sized + 'static,
{
    pub fn new(service: Arc<S>, cfg: &WorkflowConfig) -> Self {
        Self {
            state: WorkflowState::new(),
            service,
            call_timeout: cfg.call_timeout,
            cancel: None,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn set_sitemap_url(&mut self, url: impl Into<String>) {
        self.state.set_sitemap_url(url);
    }

    pub fn toggle_title(&mut self, title: &str) -> bool {
        let applied = self.state.toggle_title(title);
        if !applied {
            tracing::debug!(title, "toggle ignored: title not offered");
        }
        applied
    }

    pub fn start_submit_sitemap(&mut self) -> Option<PendingCall> {
        let call = self.state.begin_submit_sitemap();
        self.spawn_call(call, CallKind::ExtractTitles)
    }

    pub fn start_generate_outlines(&mut self) -> Option<PendingCall> {
        let call = self.state.begin_generate_outlines();
        self.spawn_call(call, CallKind::GenerateOutlines)
    }

    pub fn start_generate_content(&mut self, outline: &str) -> Option<PendingCall> {
        let call = self.state.begin_generate_content(outline);
        self.spawn_call(call, CallKind::GenerateContent)
    }

    fn spawn_call(&mut self, call: Option<IssuedCall>, kind: CallKind) -> Option<PendingCall> {
        let Some(IssuedCall { id, request }) = call else {
            tracing::debug!(?kind, busy = self.state.is_busy(), "call declined");
            return None;
        };
        tracing::info!(call_id = id, ?kind, "issuing call");

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        let svc = self.service.clone();
        let deadline = self.call_timeout;
        let handle = tokio::spawn(async move {
            service::execute_with_deadline(svc.as_ref(), request, deadline, cancel).await
        });
        Some(PendingCall { id, kind, handle })
    }

    /// Apply a call outcome. Outcomes for calls that are not in flight are ignored.
    pub fn finish(&mut self, outcome: CallOutcome) {
        let CallOutcome { id, kind, result } = outcome;
        if let Err(e) = &result {
            tracing::warn!(
                call_id = id,
                ?kind,
                transport = e.is_transport(),
                error = %e,
                "call failed"
            );
        }
        let before = self.state.stage();
        if self.state.resolve(id, result) {
            self.cancel = None;
            let after = self.state.stage();
            if after != before {
                tracing::info!(from = ?before, to = ?after, "stage advanced");
            }
        }
    }

    /// Signal cancellation of the call in flight. Busy clears when that call resolves.
    pub fn cancel_in_flight(&mut self) -> bool {
        match &self.cancel {
            Some(token) if self.state.is_busy() => {
                tracing::info!("cancelling call in flight");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Returns false when the call was declined.
    pub async fn submit_sitemap(&mut self) -> bool {
        let pending = self.start_submit_sitemap();
        self.run_to_completion(pending).await
    }

    pub async fn generate_outlines(&mut self) -> bool {
        let pending = self.start_generate_outlines();
        self.run_to_completion(pending).await
    }

    pub async fn generate_content(&mut self, outline: &str) -> bool {
        let pending = self.start_generate_content(outline);
        self.run_to_completion(pending).await
    }

    async fn run_to_completion(&mut self, pending: Option<PendingCall>) -> bool {
        match pending {
            Some(p) => {
                let outcome = p.wait().await;
                self.finish(outcome);
                true
            }
            None => false,
        }
    }
}

fn emit_state<S: ?Sized>(ctl: &WorkflowController<S>, event_tx: &UnboundedSender<WorkflowEvent>) {
    let _ = event_tx.send(WorkflowEvent::StateChanged(Box::new(ctl.state.clone())));
}

fn declined(ctl: &WorkflowState, what: &str) -> WorkflowEvent {
    let msg = match ctl.in_flight() {
        Some(f) => format!("{what} ignored: {}", f.kind.progress_label()),
        None => format!("{what} not available yet"),
    };
    WorkflowEvent::Info(msg)
}

/// Drive the workflow from UI commands and emit state back to presentation layers.
pub(crate) async fn run_controller<S>(
    mut ctl: WorkflowController<S>,
    event_tx: UnboundedSender<WorkflowEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<WorkflowState>
where
    S: GenerationService + ?Sized + 'static,
{
    let mut pending: Option<PendingCall> = None;
    let mut quit_pending = false;
    emit_state(&ctl, &event_tx);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !quit_pending => {
                let started = match cmd {
                    Some(UiCommand::SetSitemapUrl(url)) => {
                        ctl.set_sitemap_url(url);
                        None
                    }
                    Some(UiCommand::SubmitSitemap) => Some((ctl.start_submit_sitemap(), "Analyze sitemap")),
                    Some(UiCommand::ToggleTitle(title)) => {
                        ctl.toggle_title(&title);
                        None
                    }
                    Some(UiCommand::GenerateOutlines) => Some((ctl.start_generate_outlines(), "Generate outlines")),
                    Some(UiCommand::GenerateContent(outline)) => {
                        Some((ctl.start_generate_content(&outline), "Generate content"))
                    }
                    Some(UiCommand::Cancel) => {
                        if ctl.cancel_in_flight() {
                            let _ = event_tx.send(WorkflowEvent::Info("Cancelling…".into()));
                        }
                        None
                    }
                    Some(UiCommand::Quit) | None => {
                        // Quit waits for the call in flight so its task is not left detached.
                        if pending.is_none() {
                            break;
                        }
                        ctl.cancel_in_flight();
                        quit_pending = true;
                        None
                    }
                };
                if let Some((call, what)) = started {
                    match call {
                        Some(p) => pending = Some(p),
                        None => {
                            let _ = event_tx.send(declined(&ctl.state, what));
                        }
                    }
                }
                emit_state(&ctl, &event_tx);
            }
            // Only take the pending call once this branch wins so it is never dropped.
            outcome = async {
                match pending.as_mut() {
                    Some(p) => Some((&mut p.handle).await),
                    None => futures::future::pending().await,
                }
            } => {
                if let (Some(join_res), Some(p)) = (outcome, pending.take()) {
                    let result = join_res.unwrap_or_else(|e| Err(ServiceError::TaskFailed(e.to_string())));
                    ctl.finish(CallOutcome { id: p.id, kind: p.kind, result });
                    emit_state(&ctl, &event_tx);
                    if quit_pending {
                        break;
                    }
                }
            }
        }
    }

    Ok(ctl.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OutlineItem, Stage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct Fake {
        titles: Result<Vec<Option<String>>, String>,
        content: Result<String, String>,
        hang: bool,
        calls: AtomicUsize,
    }

    impl Fake {
        fn new() -> Self {
            Self {
                titles: Ok(vec![Some("Foo".into()), Some("Bar".into()), None]),
                content: Ok("Full article".into()),
                hang: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn enter(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                futures::future::pending::<()>().await;
            }
        }
    }

    #[async_trait]
    impl GenerationService for Fake {
        async fn extract_titles(&self, _: &str) -> Result<Vec<Option<String>>, ServiceError> {
            self.enter().await;
            self.titles.clone().map_err(ServiceError::Service)
        }

        async fn generate_outlines(&self, titles: &[String]) -> Result<Vec<OutlineItem>, ServiceError> {
            self.enter().await;
            Ok(titles
                .iter()
                .enumerate()
                .map(|(i, t)| OutlineItem::new(t.as_str(), format!("O{}", i + 1)))
                .collect())
        }

        async fn generate_content(&self, _: &str) -> Result<String, ServiceError> {
            self.enter().await;
            self.content.clone().map_err(ServiceError::Service)
        }
    }

    fn config(call_timeout: Duration) -> WorkflowConfig {
        WorkflowConfig {
            base_url: "http://127.0.0.1:5000".into(),
            sitemap_url: None,
            call_timeout,
            connect_timeout: Duration::from_secs(1),
            user_agent: "test".into(),
        }
    }

    fn controller(fake: Fake) -> (WorkflowController<Fake>, Arc<Fake>) {
        let fake = Arc::new(fake);
        let ctl = WorkflowController::new(fake.clone(), &config(Duration::from_secs(60)));
        (ctl, fake)
    }

    #[tokio::test]
    async fn end_to_end() {
        let (mut ctl, fake) = controller(Fake::new());
        assert_eq!(ctl.state().stage(), Stage::SitemapInput);

        ctl.set_sitemap_url("https://x.com/sitemap.xml");
        assert!(ctl.submit_sitemap().await);
        assert_eq!(ctl.state().titles(), ["Foo", "Bar"]);
        assert_eq!(ctl.state().stage(), Stage::TitleSelection);

        assert!(ctl.toggle_title("Foo"));
        assert!(ctl.generate_outlines().await);
        assert_eq!(ctl.state().outlines(), [OutlineItem::new("Foo", "O1")]);
        assert_eq!(ctl.state().stage(), Stage::OutlineAndContent);

        assert!(ctl.generate_content("O1").await);
        assert_eq!(ctl.state().generated_content(), Some("Full article"));
        assert_eq!(ctl.state().stage(), Stage::OutlineAndContent);
        assert_eq!(ctl.state().last_error(), None);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn service_error_keeps_stage() {
        let (mut ctl, _) = controller(Fake {
            titles: Err("bad url".into()),
            ..Fake::new()
        });
        ctl.set_sitemap_url("https://x.com/sitemap.xml");
        assert!(ctl.submit_sitemap().await);
        assert_eq!(ctl.state().last_error(), Some("bad url"));
        assert_eq!(ctl.state().stage(), Stage::SitemapInput);
        assert!(ctl.state().titles().is_empty());
        assert!(!ctl.state().is_busy());
    }

    #[tokio::test]
    async fn declined_operations_make_no_call() {
        let (mut ctl, fake) = controller(Fake::new());
        assert!(!ctl.submit_sitemap().await);
        assert!(!ctl.generate_outlines().await);
        assert!(!ctl.generate_content("O1").await);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn back_to_back_issue_makes_one_call() {
        let (mut ctl, fake) = controller(Fake::new());
        ctl.set_sitemap_url("https://x.com/sitemap.xml");
        let first = ctl.start_submit_sitemap().expect("first call issued");
        assert!(ctl.state().is_busy());
        assert!(ctl.start_submit_sitemap().is_none());

        let outcome = first.wait().await;
        ctl.finish(outcome);
        assert!(!ctl.state().is_busy());
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn cancel_clears_busy() {
        let (mut ctl, _) = controller(Fake {
            hang: true,
            ..Fake::new()
        });
        assert!(!ctl.cancel_in_flight());
        ctl.set_sitemap_url("https://x.com/sitemap.xml");
        let pending = ctl.start_submit_sitemap().unwrap();
        assert!(ctl.cancel_in_flight());
        let outcome = pending.wait().await;
        ctl.finish(outcome);
        assert!(!ctl.state().is_busy());
        assert_eq!(ctl.state().last_error(), Some("Request cancelled"));
        assert_eq!(ctl.state().stage(), Stage::SitemapInput);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out() {
        let fake = Arc::new(Fake {
            hang: true,
            ..Fake::new()
        });
        let mut ctl = WorkflowController::new(fake, &config(Duration::from_secs(30)));
        ctl.set_sitemap_url("https://x.com/sitemap.xml");
        assert!(ctl.submit_sitemap().await);
        assert!(!ctl.state().is_busy());
        assert_eq!(ctl.state().last_error(), Some("Request timed out after 30s"));
    }

    #[tokio::test]
    async fn command_loop_declines_while_busy_and_quits_after_cancel() {
        let (ctl, fake) = controller(Fake {
            hang: true,
            ..Fake::new()
        });
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_controller(ctl, event_tx, cmd_rx));

        cmd_tx
            .send(UiCommand::SetSitemapUrl("https://x.com/sitemap.xml".into()))
            .unwrap();
        cmd_tx.send(UiCommand::SubmitSitemap).unwrap();
        cmd_tx.send(UiCommand::SubmitSitemap).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();

        let state = task.await.unwrap().unwrap();
        // The cancel may land before the first poll of the call.
        assert!(fake.calls() <= 1);
        assert!(!state.is_busy());
        assert_eq!(state.last_error(), Some("Request cancelled"));

        let mut infos = Vec::new();
        while let Ok(ev) = event_rx.try_recv() {
            if let WorkflowEvent::Info(msg) = ev {
                infos.push(msg);
            }
        }
        assert!(infos.iter().any(|m| m.starts_with("Analyze sitemap ignored")));
    }

    async fn wait_for(
        rx: &mut mpsc::UnboundedReceiver<WorkflowEvent>,
        pred: fn(&WorkflowState) -> bool,
    ) -> WorkflowState {
        while let Some(ev) = rx.recv().await {
            if let WorkflowEvent::StateChanged(s) = ev {
                if pred(&s) {
                    return *s;
                }
            }
        }
        panic!("event stream ended");
    }

    #[tokio::test]
    async fn command_loop_runs_the_pipeline() {
        let (ctl, _) = controller(Fake::new());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_controller(ctl, event_tx, cmd_rx));

        cmd_tx
            .send(UiCommand::SetSitemapUrl("https://x.com/sitemap.xml".into()))
            .unwrap();
        cmd_tx.send(UiCommand::SubmitSitemap).unwrap();
        wait_for(&mut event_rx, |s| s.stage() == Stage::TitleSelection).await;

        cmd_tx.send(UiCommand::ToggleTitle("Bar".into())).unwrap();
        cmd_tx.send(UiCommand::ToggleTitle("Foo".into())).unwrap();
        cmd_tx.send(UiCommand::GenerateOutlines).unwrap();
        let s = wait_for(&mut event_rx, |s| s.stage() == Stage::OutlineAndContent).await;
        let order: Vec<&str> = s.outlines().iter().map(|o| o.title.as_str()).collect();
        assert_eq!(order, ["Bar", "Foo"]);

        cmd_tx.send(UiCommand::GenerateContent("O2".into())).unwrap();
        let s = wait_for(&mut event_rx, |s| s.generated_content().is_some()).await;
        assert_eq!(s.content_for("O2"), Some("Full article"));

        drop(cmd_tx);
        let final_state = task.await.unwrap().unwrap();
        assert_eq!(final_state.stage(), Stage::OutlineAndContent);
    }
}
