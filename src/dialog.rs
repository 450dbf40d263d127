use super::*;

impl Harness {
    /// Subscribes the page's dialog (if any) to cart-update signals under a
    /// single cancellation token, so removal tears everything down at once.
    pub(crate) fn mount_dialog(&mut self) -> Result<()> {
        let Some(dialog) = self.dom.query_selector("[data-upsell-modal]")? else {
            return Ok(());
        };
        let token = self.runtime.new_token();
        self.runtime
            .subscribe(token, SubscriberAction::CloseDialog { dialog }, false);
        self.dialog_subscription = Some((dialog, token));
        Ok(())
    }

    pub fn dialog_open(&self) -> Result<bool> {
        let dialog = self
            .dom
            .query_selector("[data-upsell-modal]")?
            .ok_or_else(|| Error::SelectorNotFound("[data-upsell-modal]".into()))?;
        Ok(self.dom.attr(dialog, "open").is_some())
    }

    pub(crate) fn open_dialog(&mut self) -> Result<()> {
        let Some(dialog) = self.dom.query_selector("[data-upsell-modal]")? else {
            return Ok(());
        };
        if self.dom.attr(dialog, "open").is_none() {
            self.runtime
                .trace_event_line("[dialog] open".to_string());
            self.dom.set_attr(dialog, "open", "true")?;
        }
        Ok(())
    }

    /// Closes the dialog, runs the reflow nudge where the browser needs it,
    /// and raises the modal-close signal.
    pub fn close_dialog(&mut self) -> Result<()> {
        let Some(dialog) = self.dom.query_selector("[data-upsell-modal]")? else {
            return Ok(());
        };
        self.close_dialog_node(dialog)
    }

    pub(crate) fn close_dialog_node(&mut self, dialog: NodeId) -> Result<()> {
        if self.dom.attr(dialog, "open").is_none() {
            return Ok(());
        }
        self.runtime.trace_event_line("[dialog] close".to_string());
        self.dom.remove_attr(dialog, "open")?;

        if self
            .runtime
            .user_agent
            .map(|agent| agent.needs_reflow_nudge())
            .unwrap_or(false)
        {
            self.runtime.request_frame(FrameAction::ShrinkBody);
        }

        self.emit_signal(Signal::ModalClose)
    }

    pub(crate) fn execute_frame(&mut self, frame: FrameAction) -> Result<()> {
        match frame {
            // Old mobile Safari misses the layout pass after the dialog
            // leaves the tree; forcing the body a pixel narrower and back
            // across two frames makes it reflow.
            FrameAction::ShrinkBody => {
                if let Some(body) = self.body_node() {
                    self.dom
                        .set_attr(body, "style", "width: calc(100% - 1px)")?;
                }
                self.runtime.request_frame(FrameAction::RestoreBody);
            }
            FrameAction::RestoreBody => {
                if let Some(body) = self.body_node() {
                    self.dom.remove_attr(body, "style")?;
                }
            }
        }
        Ok(())
    }

    fn body_node(&self) -> Option<NodeId> {
        if let Ok(Some(body)) = self.dom.query_selector("body") {
            return Some(body);
        }
        // Fragment pages in tests usually skip <body>; nudge the outermost
        // element instead.
        self.dom
            .children(self.dom.root)
            .iter()
            .copied()
            .find(|node| self.dom.element(*node).is_some())
    }
}
