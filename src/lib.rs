//! Event binding and dispatch over a deterministic in-memory DOM.
//!
//! A [`Page`] owns a small DOM arena together with a binding registry. Callbacks are
//! attached with [`Page::on`] and friends, removed with [`Page::off`], queried with
//! [`Page::bound`] and fired synthetically with [`Page::trigger`] or through the host's
//! native dispatch with [`Page::dispatch`]. Event types the host does not know natively can
//! be plugged in with [`Page::add_event`].
//!
//! ```
//! use dom_events::{BindOptions, Handler, Page, Result};
//!
//! fn main() -> Result<()> {
//!     let mut page = Page::from_html("<button id='save'>Save</button><p id='out'></p>")?;
//!     let handler = Handler::new(|page: &mut Page, _call: &dom_events::Invocation| {
//!         let out = page.select("#out")?;
//!         page.set_text(out, "saved")
//!     });
//!     page.on_with("#save", "click.toolbar", &handler, BindOptions::new().once(true))?;
//!     page.click("#save")?;
//!     page.assert_text("#out", "saved")?;
//!     assert!(page.bound("#save", None, None, None)?.is_empty());
//!     Ok(())
//! }
//! ```

use thiserror::Error;

mod bind;
mod custom;
mod dom;
mod event;
mod event_key;
mod handler;
mod html;
mod matcher;
mod native;
mod options;
mod page;
mod registry;
mod selector;
mod trigger;
mod unbind;

pub use custom::{CustomBinding, CustomHook};
pub use dom::NodeId;
pub use event::{Event, EventOutcome};
pub use event_key::EventKey;
pub use handler::{Handler, HandlerId, Invocation, Value};
pub use options::{BindOptions, BindRequest, EventMap, Selection, Target, UnbindEvents, UnbindRequest};
pub use page::Page;
pub use registry::{Binding, BindingId, Registration};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("invalid node: {0}")]
    InvalidNode(String),
    #[error("invalid event key: {0}")]
    InvalidEventKey(String),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(
        "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
    )]
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}
