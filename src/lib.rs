//! Deterministic headless runtime for a storefront upsell modal widget.
//!
//! The widget is the usual storefront trio: a trigger that fetches a
//! product-options fragment, a dialog that shows it, and a content controller
//! that manages selection, variant resolution, the subtotal readout, and
//! submission to the cart endpoint. Here it runs against an in-memory DOM
//! with a virtual clock and mocked network transport, so the whole
//! interaction contract is drivable and assertable from ordinary Rust tests:
//!
//! ```
//! use upsell_modal::Harness;
//!
//! # fn main() -> upsell_modal::Result<()> {
//! let mut h = Harness::from_html(
//!     r#"
//!     <a id='t' data-upsell-trigger data-product-handle='tee' href='/products/tee'>Add</a>
//!     <div data-upsell-modal><div data-modal-content></div></div>
//!     "#,
//! )?;
//! h.mock_product_fragment("tee", "<p id='offer'>Goes well with</p>");
//! h.click("#t")?;
//! h.assert_text("#offer", "Goes well with")?;
//! assert!(h.dialog_open()?);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;

mod content;
mod dialog;
mod dom;
mod html;
mod money;
mod runtime;
mod selector;
mod trigger;
mod variant;

#[cfg(test)]
mod tests;

pub use money::format_money;
pub use runtime::{CartItem, CartRequest, PendingTimer, Signal};
pub use variant::{FeaturedImage, Variant, match_variant};

use dom::{Dom, NodeId};
use runtime::{
    FrameAction, Runtime, SubscriberAction, SubscriptionToken, TimerAction, parse_mobile_safari,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
    Runtime(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
            Self::Runtime(msg) => write!(f, "runtime error: {msg}"),
        }
    }
}

impl StdError for Error {}

/// The mounted page: DOM tree plus runtime state, driven through simulated
/// user input and virtual time.
pub struct Harness {
    dom: Dom,
    runtime: Runtime,
    dialog_subscription: Option<(NodeId, SubscriptionToken)>,
}

impl Harness {
    pub fn from_html(html: &str) -> Result<Self> {
        let dom = html::parse_document(html)?;
        let mut harness = Self {
            dom,
            runtime: Runtime::default(),
            dialog_subscription: None,
        };
        harness.mount_dialog()?;
        harness.init_cards()?;
        Ok(harness)
    }

    // --- configuration -----------------------------------------------------

    pub fn set_user_agent(&mut self, user_agent: &str) {
        self.runtime.user_agent = parse_mobile_safari(user_agent);
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.runtime.trace.enabled = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.runtime.take_trace_logs()
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.runtime.trace.to_stderr = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.runtime.trace.events = enabled;
    }

    pub fn set_trace_timers(&mut self, enabled: bool) {
        self.runtime.trace.timers = enabled;
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Runtime(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.runtime.timer_step_limit = max_steps;
        Ok(())
    }

    // --- network mocking ---------------------------------------------------

    /// Registers a GET response for a URL. URLs without a registered body
    /// behave as network failures.
    pub fn mock_fetch(&mut self, url: &str, body: &str) {
        self.runtime.mock_fetch(url, body);
    }

    /// Registers the options fragment served for a product handle.
    pub fn mock_product_fragment(&mut self, handle: &str, body: &str) {
        let url = trigger::fragment_url(handle);
        self.runtime.mock_fetch(&url, body);
    }

    /// Sets the HTTP status returned by the cart endpoint (default 200).
    pub fn set_cart_status(&mut self, status: u16) {
        self.runtime.set_cart_status(status);
    }

    pub fn fetch_calls(&self) -> &[String] {
        self.runtime.fetch_calls()
    }

    pub fn cart_requests(&self) -> &[CartRequest] {
        self.runtime.cart_requests()
    }

    // --- observability -----------------------------------------------------

    pub fn emitted_signals(&self) -> &[Signal] {
        self.runtime.signal_log()
    }

    pub fn error_log(&self) -> &[String] {
        self.runtime.error_log()
    }

    /// Raises a cart-update application signal, as another storefront
    /// component would after changing the cart.
    pub fn announce_cart_update(&mut self, did_error: bool) -> Result<()> {
        self.emit_signal(Signal::CartUpdate { did_error })
    }

    // --- simulated input ---------------------------------------------------

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        self.runtime
            .trace_event_line(format!("[event] click selector={selector}"));

        if let Some(trigger) = self.dom.closest(target, "[data-upsell-trigger]")? {
            // Default navigation is suppressed; the widget owns the click.
            return self.activate_trigger(trigger);
        }

        if let Some(confirm) = self.dom.closest(target, "[data-upsell-confirm]")? {
            return self.confirm_selection(confirm);
        }

        if self.is_checkbox(target) {
            let current = self.dom.checked(target)?;
            self.dom.set_checked(target, !current)?;
            return self.sync_selection_from_checkbox(target);
        }

        if let Some(card) = self.dom.closest(target, ".upsell-card")? {
            if !self.is_interactive_control(target, card)? {
                return self.toggle_card(card);
            }
        }

        Ok(())
    }

    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        if !self.is_checkbox(target) {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input[type=checkbox]".into(),
                actual: self
                    .dom
                    .tag_name(target)
                    .unwrap_or("non-element")
                    .to_string(),
            });
        }

        let current = self.dom.checked(target)?;
        if current != checked {
            self.runtime
                .trace_event_line(format!("[event] change selector={selector}"));
            self.dom.set_checked(target, checked)?;
            self.sync_selection_from_checkbox(target)?;
        }
        Ok(())
    }

    /// Changes a variant selector to the given option value and runs variant
    /// resolution for the enclosing card.
    pub fn select_option(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        let tag = self
            .dom
            .tag_name(target)
            .unwrap_or_default()
            .to_ascii_lowercase();
        if tag != "select" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "select".into(),
                actual: tag,
            });
        }

        self.runtime
            .trace_event_line(format!("[event] change selector={selector} value={value}"));
        self.dom.set_select_value(target, value)?;

        if let Some(card) = self.dom.closest(target, ".upsell-card")? {
            self.resolve_variant(card)?;
        }
        Ok(())
    }

    /// Detaches a subtree. Removing the dialog revokes every subscription
    /// registered under its cancellation token.
    pub fn remove(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if let Some((dialog, token)) = self.dialog_subscription {
            if dialog == target || self.dom.is_descendant_of(dialog, target) {
                self.runtime.revoke_token(token);
                self.dialog_subscription = None;
            }
        }
        self.dom.remove_node(target);
        Ok(())
    }

    // --- virtual time ------------------------------------------------------

    pub fn now_ms(&self) -> i64 {
        self.runtime.now_ms
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.runtime.pending_timers()
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Runtime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.runtime.now_ms;
        self.runtime.now_ms = self.runtime.now_ms.saturating_add(delta_ms);
        let ran = self.run_timer_queue(Some(self.runtime.now_ms), false)?;
        self.runtime.trace_timer_line(format!(
            "[timer] advance delta_ms={} from={} to={} ran_due={}",
            delta_ms, from, self.runtime.now_ms, ran
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.runtime.now_ms {
            return Err(Error::Runtime(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.runtime.now_ms
            )));
        }
        self.runtime.now_ms = target_ms;
        self.run_timer_queue(Some(self.runtime.now_ms), false)?;
        Ok(())
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        self.run_timer_queue(Some(self.runtime.now_ms), false)
    }

    /// Runs one frame's worth of queued animation-frame work; work queued
    /// while the frame runs waits for the next frame. Returns how many
    /// callbacks ran.
    pub fn run_animation_frame(&mut self) -> Result<usize> {
        let frames = self.runtime.take_current_frames();
        let count = frames.len();
        for frame in frames {
            self.execute_frame(frame)?;
        }
        Ok(count)
    }

    /// Runs animation frames and timers to quiescence, advancing the clock
    /// past future timers.
    pub fn flush(&mut self) -> Result<()> {
        let mut rounds = 0usize;
        loop {
            rounds += 1;
            if rounds > self.runtime.timer_step_limit {
                return Err(Error::Runtime(format!(
                    "flush exceeded max rounds: limit={}",
                    self.runtime.timer_step_limit
                )));
            }
            let frames = self.run_animation_frame()?;
            let timers = self.run_timer_queue(None, true)?;
            if frames == 0 && timers == 0 && !self.runtime.has_pending_frames() {
                return Ok(());
            }
        }
    }

    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(next_idx) = self.runtime.next_task_index(due_limit) {
            steps += 1;
            if steps > self.runtime.timer_step_limit {
                return Err(Error::Runtime(format!(
                    "timer queue exceeded max task steps: limit={}, pending={}",
                    self.runtime.timer_step_limit,
                    self.runtime.task_queue.len()
                )));
            }
            let task = self.runtime.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.runtime.now_ms {
                self.runtime.now_ms = task.due_at;
            }
            self.execute_timer_task(task)?;
        }
        Ok(steps)
    }

    fn execute_timer_task(&mut self, task: runtime::ScheduledTask) -> Result<()> {
        self.runtime.trace_timer_line(format!(
            "[timer] run id={} due_at={} now_ms={}",
            task.id, task.due_at, self.runtime.now_ms
        ));
        match task.action {
            TimerAction::AnnounceCartUpdate { did_error } => {
                self.emit_signal(Signal::CartUpdate { did_error })
            }
        }
    }

    // --- signal plumbing ---------------------------------------------------

    fn emit_signal(&mut self, signal: Signal) -> Result<()> {
        let actions = self.runtime.emit(signal.clone());
        for action in actions {
            match action {
                SubscriberAction::CloseDialog { dialog } => {
                    // The dialog only auto-closes on a clean cart update.
                    if matches!(signal, Signal::CartUpdate { did_error: false }) {
                        self.close_dialog_node(dialog)?;
                    }
                }
                SubscriberAction::DeactivateTrigger { trigger } => {
                    self.dom.class_remove(trigger, "is-active")?;
                }
            }
        }
        Ok(())
    }

    // --- inspection --------------------------------------------------------

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_checked(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.checked(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.attr(target, name))
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn has_class(&self, selector: &str, class_name: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        self.dom.class_contains(target, class_name)
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    // --- internals ---------------------------------------------------------

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }

    fn is_checkbox(&self, node_id: NodeId) -> bool {
        self.dom
            .tag_name(node_id)
            .map(|tag| tag.eq_ignore_ascii_case("input"))
            .unwrap_or(false)
            && self
                .dom
                .attr(node_id, "type")
                .map(|kind| kind.eq_ignore_ascii_case("checkbox"))
                .unwrap_or(false)
    }

    // A click on the card surface toggles selection, but clicks landing on
    // the card's own controls must not double up on their default action.
    fn is_interactive_control(&self, target: NodeId, card: NodeId) -> Result<bool> {
        if target == card {
            return Ok(false);
        }
        let mut cursor = Some(target);
        while let Some(current) = cursor {
            if current == card {
                return Ok(false);
            }
            if let Some(tag) = self.dom.tag_name(current) {
                if matches!(
                    tag.to_ascii_lowercase().as_str(),
                    "input" | "select" | "option" | "button" | "label" | "a"
                ) {
                    return Ok(true);
                }
            }
            cursor = self.dom.parent(current);
        }
        Ok(false)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
