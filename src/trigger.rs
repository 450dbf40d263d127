use super::*;

pub(crate) const DEFAULT_ERROR_MESSAGE: &str =
    "These products could not be loaded. Please try again.";

const FRAGMENT_SECTION_ID: &str = "upsell-modal-products";

pub(crate) fn fragment_url(handle: &str) -> String {
    format!("/products/{handle}?section_id={FRAGMENT_SECTION_ID}")
}

impl Harness {
    /// Loads the product-options fragment into the content host and opens the
    /// dialog. A fetch failure swaps in the configured fallback message; the
    /// dialog opens regardless. The trigger stays visually active until the
    /// next modal-close signal.
    pub(crate) fn activate_trigger(&mut self, trigger: NodeId) -> Result<()> {
        let handle = self
            .dom
            .attr(trigger, "data-product-handle")
            .filter(|handle| !handle.is_empty());
        let Some(handle) = handle else {
            self.runtime
                .error("upsell trigger activated without a product handle".to_string());
            return Ok(());
        };

        let host = self.content_host()?;
        match self.runtime.fetch(&fragment_url(&handle)) {
            Some(body) => {
                self.dom.set_inner_html(host, &body)?;
                self.init_cards()?;
            }
            None => {
                self.runtime
                    .error(format!("failed to load product fragment for {handle}"));
                let message = self
                    .dom
                    .attr(trigger, "data-error-message")
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
                self.dom.set_text_content(host, &message)?;
            }
        }

        self.dom.class_add(trigger, "is-active")?;
        let token = self.runtime.new_token();
        self.runtime
            .subscribe(token, SubscriberAction::DeactivateTrigger { trigger }, true);

        self.open_dialog()
    }

    pub(crate) fn content_host(&self) -> Result<NodeId> {
        self.dom
            .query_selector("[data-modal-content]")?
            .ok_or_else(|| Error::SelectorNotFound("[data-modal-content]".into()))
    }
}
