use super::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::dom::NodeId;

/// Domain work carried by a virtual timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerAction {
    AnnounceCartUpdate { did_error: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) action: TimerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
}

/// Animation-frame work; frames queued while one runs execute on the next
/// frame, never the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameAction {
    ShrinkBody,
    RestoreBody,
}

/// Application-level signal, observable in emission order via the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    CartUpdate { did_error: bool },
    ModalClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionToken(u64);

/// What a live subscription does when its signal fires. The payload check
/// (for cart updates) happens at delivery, like a listener inspecting the
/// event it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscriberAction {
    CloseDialog { dialog: NodeId },
    DeactivateTrigger { trigger: NodeId },
}

impl SubscriberAction {
    fn wants(&self, signal: &Signal) -> bool {
        match self {
            Self::CloseDialog { .. } => matches!(signal, Signal::CartUpdate { .. }),
            Self::DeactivateTrigger { .. } => matches!(signal, Signal::ModalClose),
        }
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    token: SubscriptionToken,
    action: SubscriberAction,
    once: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRequest {
    pub url: String,
    pub body: String,
    pub items: Vec<CartItem>,
}

#[derive(Serialize)]
struct CartPayload<'a> {
    items: &'a [CartItem],
}

/// Mobile Safari identity parsed from a user agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BrowserAgent {
    pub(crate) major: u32,
    pub(crate) minor: u32,
}

impl BrowserAgent {
    // The layout-reflow nudge only applies to mobile Safari before 16.4,
    // where WebKit still skipped the layout pass after a dialog was removed.
    pub(crate) fn needs_reflow_nudge(self) -> bool {
        self.major < 16 || (self.major == 16 && self.minor < 4)
    }
}

pub(crate) fn parse_mobile_safari(user_agent: &str) -> Option<BrowserAgent> {
    if !user_agent.contains("Safari") {
        return None;
    }
    if let Some(version) = version_after(user_agent, "iPhone OS ") {
        return Some(version);
    }
    if user_agent.contains("Mobile") {
        if let Some(version) = version_after(user_agent, "Version/") {
            return Some(version);
        }
    }
    None
}

fn version_after(haystack: &str, marker: &str) -> Option<BrowserAgent> {
    let rest = &haystack[haystack.find(marker)? + marker.len()..];
    let mut parts = rest
        .split(|c: char| !c.is_ascii_digit())
        .take_while(|part| !part.is_empty());
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().and_then(|part| part.parse().ok()).unwrap_or(0);
    Some(BrowserAgent { major, minor })
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) events: bool,
    pub(crate) timers: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
    pub(crate) to_stderr: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            timers: true,
            logs: VecDeque::new(),
            log_limit: 10_000,
            to_stderr: true,
        }
    }
}

/// Everything outside the DOM tree: virtual clock and timer queue, frame
/// queue, signal bus, mocked network transport, logs, and browser identity.
#[derive(Debug)]
pub(crate) struct Runtime {
    pub(crate) now_ms: i64,
    pub(crate) task_queue: Vec<ScheduledTask>,
    pub(crate) timer_step_limit: usize,
    next_timer_id: i64,
    next_task_order: i64,
    frame_queue: VecDeque<FrameAction>,
    subscriptions: Vec<Subscription>,
    next_token: u64,
    signal_log: Vec<Signal>,
    fetch_mocks: HashMap<String, String>,
    fetch_calls: Vec<String>,
    cart_status: u16,
    cart_requests: Vec<CartRequest>,
    error_log: Vec<String>,
    pub(crate) trace: TraceState,
    pub(crate) user_agent: Option<BrowserAgent>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            now_ms: 0,
            task_queue: Vec::new(),
            timer_step_limit: 10_000,
            next_timer_id: 1,
            next_task_order: 0,
            frame_queue: VecDeque::new(),
            subscriptions: Vec::new(),
            next_token: 1,
            signal_log: Vec::new(),
            fetch_mocks: HashMap::new(),
            fetch_calls: Vec::new(),
            cart_status: 200,
            cart_requests: Vec::new(),
            error_log: Vec::new(),
            trace: TraceState::default(),
            user_agent: None,
        }
    }
}

impl Runtime {
    pub(crate) fn set_timeout(&mut self, delay_ms: i64, action: TimerAction) -> i64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        let order = self.next_task_order;
        self.next_task_order += 1;
        let due_at = self.now_ms.saturating_add(delay_ms.max(0));
        self.task_queue.push(ScheduledTask {
            id,
            due_at,
            order,
            action,
        });
        self.trace_timer_line(format!("[timer] schedule id={id} due_at={due_at}"));
        id
    }

    pub(crate) fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| {
                if let Some(limit) = due_limit {
                    task.due_at <= limit
                } else {
                    true
                }
            })
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }

    pub(crate) fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    pub(crate) fn request_frame(&mut self, action: FrameAction) {
        self.trace_timer_line(format!("[frame] request {action:?}"));
        self.frame_queue.push_back(action);
    }

    pub(crate) fn take_current_frames(&mut self) -> Vec<FrameAction> {
        self.frame_queue.drain(..).collect()
    }

    pub(crate) fn has_pending_frames(&self) -> bool {
        !self.frame_queue.is_empty()
    }

    pub(crate) fn new_token(&mut self) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        token
    }

    pub(crate) fn subscribe(
        &mut self,
        token: SubscriptionToken,
        action: SubscriberAction,
        once: bool,
    ) {
        self.subscriptions.push(Subscription {
            token,
            action,
            once,
        });
    }

    pub(crate) fn revoke_token(&mut self, token: SubscriptionToken) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.token != token);
        let revoked = before - self.subscriptions.len();
        self.trace_event_line(format!("[signal] revoke token={:?} count={revoked}", token));
        revoked
    }

    /// Records the signal and collects the actions of every live subscription
    /// it reaches, consuming one-shot subscriptions.
    pub(crate) fn emit(&mut self, signal: Signal) -> Vec<SubscriberAction> {
        self.trace_event_line(format!("[signal] emit {signal:?}"));
        self.signal_log.push(signal.clone());

        let mut fired = Vec::new();
        let mut kept = Vec::with_capacity(self.subscriptions.len());
        for sub in self.subscriptions.drain(..) {
            if sub.action.wants(&signal) {
                fired.push(sub.action);
                if !sub.once {
                    kept.push(sub);
                }
            } else {
                kept.push(sub);
            }
        }
        self.subscriptions = kept;
        fired
    }

    pub(crate) fn signal_log(&self) -> &[Signal] {
        &self.signal_log
    }

    pub(crate) fn mock_fetch(&mut self, url: &str, body: &str) {
        self.fetch_mocks.insert(url.to_string(), body.to_string());
    }

    /// A GET against the mocked transport. An unmocked URL behaves as a
    /// network failure.
    pub(crate) fn fetch(&mut self, url: &str) -> Option<String> {
        self.fetch_calls.push(url.to_string());
        let body = self.fetch_mocks.get(url).cloned();
        self.trace_event_line(format!(
            "[fetch] get url={url} ok={}",
            body.is_some()
        ));
        body
    }

    pub(crate) fn fetch_calls(&self) -> &[String] {
        &self.fetch_calls
    }

    pub(crate) fn set_cart_status(&mut self, status: u16) {
        self.cart_status = status;
    }

    pub(crate) fn submit_cart(&mut self, url: &str, items: &[CartItem]) -> Result<u16> {
        let body = serde_json::to_string(&CartPayload { items })
            .map_err(|err| Error::Runtime(format!("cart payload serialization failed: {err}")))?;
        self.trace_event_line(format!(
            "[fetch] post url={url} items={} status={}",
            items.len(),
            self.cart_status
        ));
        self.cart_requests.push(CartRequest {
            url: url.to_string(),
            body,
            items: items.to_vec(),
        });
        Ok(self.cart_status)
    }

    pub(crate) fn cart_requests(&self) -> &[CartRequest] {
        &self.cart_requests
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.trace.to_stderr && self.trace.enabled {
            eprintln!("[error] {message}");
        }
        self.error_log.push(message);
    }

    pub(crate) fn error_log(&self) -> &[String] {
        &self.error_log
    }

    pub(crate) fn trace_event_line(&mut self, line: String) {
        if self.trace.enabled && self.trace.events {
            self.push_trace_line(line);
        }
    }

    pub(crate) fn trace_timer_line(&mut self, line: String) {
        if self.trace.enabled && self.trace.timers {
            self.push_trace_line(line);
        }
    }

    fn push_trace_line(&mut self, line: String) {
        if self.trace.to_stderr {
            eprintln!("{line}");
        }
        self.trace.logs.push_back(line);
        while self.trace.logs.len() > self.trace.log_limit {
            self.trace.logs.pop_front();
        }
    }

    pub(crate) fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace.logs.drain(..).collect()
    }
}
